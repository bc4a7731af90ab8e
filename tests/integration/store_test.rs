//! S3 adapter tests against LocalStack.

use crate::common::{LocalStackTestContext, unique_bucket};
use bm_traits::{ListRequest, ObjectStore};
use bm_types::ObjectKey;
use bm_store_s3::S3Store;
use bytes::Bytes;

async fn setup() -> Option<(LocalStackTestContext, S3Store)> {
    let ctx = LocalStackTestContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return None;
    }
    let store = ctx.store().await;
    Some((ctx, store))
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_list_page_follows_tokens() {
    let Some((ctx, store)) = setup().await else { return };
    let bucket = unique_bucket("bm-list");
    ctx.create_bucket(&bucket).await.unwrap();
    for key in ["a", "b", "c"] {
        ctx.put(&bucket, key, key).await.unwrap();
    }

    let first = store
        .list_page(&ListRequest::new(&bucket).with_max_keys(Some(2)))
        .await
        .unwrap();
    assert_eq!(first.keys, vec![ObjectKey::from("a"), ObjectKey::from("b")]);
    assert!(first.next_token.is_some());

    let second = store
        .list_page(
            &ListRequest::new(&bucket)
                .with_max_keys(Some(2))
                .with_continuation_token(first.next_token),
        )
        .await
        .unwrap();
    assert_eq!(second.keys, vec![ObjectKey::from("c")]);
    assert!(second.next_token.is_none());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_copy_key_with_special_characters() {
    let Some((ctx, store)) = setup().await else { return };
    let source = unique_bucket("bm-src");
    let dest = unique_bucket("bm-dst");
    ctx.create_bucket(&source).await.unwrap();
    ctx.create_bucket(&dest).await.unwrap();
    let key = "reports/q1 final+v2 (caf\u{e9}).csv";
    ctx.put(&source, key, "payload").await.unwrap();

    store
        .copy_object(&source, &dest, &ObjectKey::from(key))
        .await
        .unwrap();

    assert_eq!(ctx.get(&dest, key).await.as_deref(), Some("payload"));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_missing_key_is_not_found() {
    let Some((ctx, store)) = setup().await else { return };
    let bucket = unique_bucket("bm-src");
    ctx.create_bucket(&bucket).await.unwrap();

    let err = store
        .get_object(&bucket, &ObjectKey::from("missing.txt"))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "not found");
    assert!(!err.is_transient());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_put_then_get() {
    let Some((ctx, store)) = setup().await else { return };
    let bucket = unique_bucket("bm-put");
    ctx.create_bucket(&bucket).await.unwrap();
    let key = ObjectKey::from("nested/path/object.json");

    store
        .put_object(&bucket, &key, bytes_of("{\"ok\":true}"))
        .await
        .unwrap();
    let body = store.get_object(&bucket, &key).await.unwrap();

    assert_eq!(&body[..], b"{\"ok\":true}");
}

fn bytes_of(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}
