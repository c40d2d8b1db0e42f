//! E2E tests for linkwalk CLI

#![allow(deprecated)] // cargo_bin deprecation - will update when assert_cmd stabilizes replacement

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn linkwalk() -> Command {
    Command::cargo_bin("linkwalk").unwrap()
}

#[test]
fn test_help() {
    linkwalk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("follow"))
        .stdout(predicate::str::contains("links"))
        .stdout(predicate::str::contains("select"));
}

#[test]
fn test_version() {
    linkwalk()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("linkwalk"));
}

#[test]
fn test_follow_help() {
    linkwalk()
        .args(["follow", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter"))
        .stdout(predicate::str::contains("--header"))
        .stdout(predicate::str::contains("--ns"));
}

#[test]
fn test_links_help() {
    linkwalk()
        .args(["links", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--max-bytes"))
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_select_help() {
    linkwalk()
        .args(["select", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--via"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn test_links_requires_url() {
    linkwalk().arg("links").assert().failure();
}

#[test]
fn test_unsupported_scheme() {
    linkwalk()
        .args(["follow", "ftp://example.com/root", "next"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported URL scheme"));
}

#[test]
fn test_bad_header_flag() {
    linkwalk()
        .args(["follow", "http://example.com/", "next", "-H", "no-colon"])
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_follow_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/root"))
        .respond_with(ResponseTemplate::new(200).insert_header("Link", r#"</page/2>; rel="next""#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page/2"))
        .respond_with(ResponseTemplate::new(200).insert_header("Link", r#"</root>; rel="prev""#))
        .mount(&server)
        .await;

    linkwalk()
        .args(["follow", &format!("{}/root", server.uri()), "next", "prev"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""rel": "next""#))
        .stdout(predicate::str::contains(format!(
            r#""url": "{}/root""#,
            server.uri()
        )));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_select_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><title>One</title></entry><entry><title>Two</title></entry></feed>"#,
            "application/atom+xml",
        ))
        .mount(&server)
        .await;

    linkwalk()
        .args([
            "select",
            &format!("{}/feed", server.uri()),
            "//a:entry/a:title",
            "--ns",
            "a=http://www.w3.org/2005/Atom",
            "-f",
            "yaml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("count: 2"))
        .stdout(predicate::str::contains("- One"))
        .stdout(predicate::str::contains("- Two"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_links_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", r#"</feed?page=2>; rel="next""#)
                .set_body_raw(
                    r#"<feed xmlns="http://www.w3.org/2005/Atom"><link rel="self" href="/feed"/><entry><link rel="alternate" href="/entries/1"/></entry></feed>"#,
                    "application/atom+xml",
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", r#"</feed>; rel="up""#)
                .set_body_raw("plain body", "text/plain; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let output = linkwalk()
        .args([
            "links".to_string(),
            format!("{}/feed", server.uri()),
            format!("{}/plain", server.uri()),
            "http://127.0.0.1:9/unreachable".to_string(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 3);
    assert_eq!(report["ok"], 2);
    assert_eq!(report["failed"], 1);

    let feed = &report["pages"][0];
    assert_eq!(feed["variant"], "structured");
    assert_eq!(feed["status"], 200);
    assert_eq!(feed["content_type"], "application/atom+xml");
    assert_eq!(feed["header_links"]["next"], "/feed?page=2");
    assert_eq!(
        feed["body_links"],
        serde_json::json!([
            {"rel": "self", "href": "/feed"},
            {"rel": "alternate", "href": "/entries/1"}
        ])
    );

    let plain = &report["pages"][1];
    assert_eq!(plain["variant"], "generic");
    assert_eq!(plain["charset"], "utf-8");
    assert_eq!(plain["header_links"]["up"], "/feed");
    assert!(plain.get("body_links").is_none());
    assert_eq!(plain["text"], "plain body");

    let down = &report["pages"][2];
    assert_eq!(down["ok"], false);
    assert!(down["err"].as_str().unwrap().contains("transport error"));
}
