// tests/resolver_mockito_test.rs

use ks_cdn::{
    config::AppConfig,
    models::{Outcome, Record},
    resolver::{KuaishouResolver, Transform},
};
use mockito::Matcher;
use serde_json::json;

fn share_record(text: &str) -> Record {
    json!({"URL": text}).as_object().cloned().unwrap()
}

fn resolver_for(endpoints: Vec<String>) -> KuaishouResolver {
    let config = AppConfig {
        endpoints,
        ..AppConfig::default()
    };
    KuaishouResolver::from_config(&config).expect("Failed to create resolver")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_share_link_resolves_through_redirect_and_graphql() {
    // --- 1. Arrange ---
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let short_link = server
        .mock("GET", "/f/X7abc")
        .with_status(302)
        .with_header("Location", &format!("{}/short-video/3xk9q2m7pzd?authorId=1", base))
        .create_async()
        .await;
    let landing = server
        .mock("GET", "/short-video/3xk9q2m7pzd")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html></html>")
        .create_async()
        .await;
    let graphql = server
        .mock("POST", "/graphql")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "operationName": "visionVideoDetail",
            "variables": {"photoId": "3xk9q2m7pzd"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": {"visionVideoDetail": {"photo": {
                "photoUrl": "https://example.com/cover.jpg",
                "mainUrl": "https://v2.kwaicdn.com/upic/3xk9q2m7pzd.mp4"
            }}}})
            .to_string(),
        )
        .create_async()
        .await;

    let resolver = resolver_for(vec![format!("{}/graphql", base)]);

    // --- 2. Act ---
    let text = format!("看看这个作品 {}/f/X7abc 复制打开快手", base);
    let outcome = resolver.transform(&share_record(&text)).await;

    // --- 3. Assert ---
    assert_eq!(outcome, Outcome::success("https://v2.kwaicdn.com/upic/3xk9q2m7pzd.mp4"));
    short_link.assert_async().await;
    landing.assert_async().await;
    graphql.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_falls_back_to_next_endpoint_and_rejects_captcha_urls() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", Matcher::Regex(r"^/photo/".to_string()))
        .with_status(200)
        .create_async()
        .await;
    let broken = server
        .mock("POST", "/broken")
        .with_status(500)
        .create_async()
        .await;
    let captcha = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(
            json!({"data": {"visionVideoDetail": {"photo": {
                "photoUrl": "https://captcha.zt.kuaishou.com/iframe?x=1"
            }}}})
            .to_string(),
        )
        .create_async()
        .await;

    let resolver = resolver_for(vec![format!("{}/broken", base), format!("{}/graphql", base)]);
    let outcome = resolver
        .transform(&share_record(&format!("{}/photo/5abcdef123", base)))
        .await;

    assert_eq!(outcome.result, "");
    assert!(outcome.error.starts_with("captcha url is not a CDN url"), "{}", outcome.error);
    assert_eq!(resolver.classify(&outcome.error), "captcha_url");
    broken.assert_async().await;
    captcha.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_cdn_in_any_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    server
        .mock("GET", Matcher::Any)
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"data":{"visionVideoDetail":null}}"#)
        .create_async()
        .await;

    let resolver = resolver_for(vec![format!("{}/graphql", base)]);
    let outcome = resolver
        .transform(&share_record(&format!("{}/short-video/3xnothing1", base)))
        .await;
    assert_eq!(outcome, Outcome::failure("cdn url not found"));

    // 没有作品 ID 的链接不会请求接口
    let outcome = resolver
        .transform(&share_record(&format!("{}/profile/abc", base)))
        .await;
    assert_eq!(outcome, Outcome::failure("photoId not found"));
}

#[tokio::test]
async fn test_input_errors_need_no_network() {
    let resolver = resolver_for(vec!["http://127.0.0.1:9/graphql".to_string()]);
    assert_eq!(resolver.transform(&share_record("   ")).await, Outcome::failure("empty url"));
    assert_eq!(
        resolver.transform(&share_record("no link in this text")).await,
        Outcome::failure("no http/https url found")
    );
    assert_eq!(
        resolver.transform(&Record::new()).await,
        Outcome::failure("empty url")
    );
}
