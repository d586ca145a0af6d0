//! Browser action against a local mock server

use mockito::Matcher;
use serde_json::json;

use tagloop_agent::actions::BrowserAction;
use tagloop_agent::Action;

const PAGE: &str = "<html><head><title>Docs</title></head>\
                    <body><h1>Tokio</h1><p>An asynchronous runtime.</p></body></html>";

#[tokio::test]
async fn test_open_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/docs")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(PAGE)
        .create_async()
        .await;
    let url = format!("{}/docs", server.url());

    let out = BrowserAction::new(10000)
        .execute(json!({"url": url}))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(out.content.starts_with(&format!("Opened '{}':\n", url)));
    assert!(out.content.contains("Tokio"));
    assert!(out.content.contains("An asynchronous runtime."));
    assert!(!out.content.contains("<p>"));
}

#[tokio::test]
async fn test_search_opens_first_result() {
    let mut server = mockito::Server::new_async().await;
    let target = format!("{}/docs", server.url());
    let results = format!(
        r#"<html><body>
        <a class="result__a" href="/l/?uddg={}&amp;rut=1">Tokio docs</a>
        <a class="result__a" href="{}/other">Other</a>
        </body></html>"#,
        target.replace(':', "%3A").replace('/', "%2F"),
        server.url()
    );
    let search = server
        .mock("GET", "/html/")
        .match_query(Matcher::UrlEncoded("q".into(), "tokio runtime".into()))
        .with_status(200)
        .with_body(results)
        .create_async()
        .await;
    let page = server
        .mock("GET", "/docs")
        .with_status(200)
        .with_body(PAGE)
        .create_async()
        .await;

    let action = BrowserAction::new(10000).with_search_url(format!("{}/html/", server.url()));
    let out = action
        .execute(json!({"query": "tokio runtime"}))
        .await
        .unwrap();

    search.assert_async().await;
    page.assert_async().await;
    assert!(out
        .content
        .starts_with(&format!("Searched for 'tokio runtime', opened '{}':\n", target)));
    assert!(out.content.contains("An asynchronous runtime."));
}

#[tokio::test]
async fn test_search_without_results() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/html/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html><body>No results.</body></html>")
        .create_async()
        .await;

    let action = BrowserAction::new(10000).with_search_url(format!("{}/html/", server.url()));
    let out = action.execute(json!({"query": "zzzz"})).await.unwrap();

    assert_eq!(
        out.content,
        "Could not find the first search result link for query: 'zzzz'."
    );
}

#[tokio::test]
async fn test_page_text_is_truncated() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_body(format!("<p>{}</p>", "word ".repeat(200)))
        .create_async()
        .await;

    let out = BrowserAction::new(20)
        .execute(json!({"url": format!("{}/long", server.url())}))
        .await
        .unwrap();

    assert!(out.content.ends_with("... (truncated)"));
}

#[tokio::test]
async fn test_http_error_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;
    let url = format!("{}/gone", server.url());

    let out = BrowserAction::new(100)
        .execute(json!({"url": url}))
        .await
        .unwrap();

    assert!(out.content.starts_with(&format!("Error opening URL '{}'", url)));
}

#[tokio::test]
async fn test_requires_exactly_one_of_query_and_url() {
    let action = BrowserAction::new(100);

    let out = action
        .execute(json!({"query": "a", "url": "https://example.com"}))
        .await
        .unwrap();
    assert_eq!(out.content, "Error: Provide either 'url' or 'query', not both.");

    let out = action.execute(json!({})).await.unwrap();
    assert_eq!(out.content, "Error: Provide either 'url' or 'query'.");

    let out = action.execute(json!({"url": "  "})).await.unwrap();
    assert_eq!(out.content, "Error: Provide either 'url' or 'query'.");
}
