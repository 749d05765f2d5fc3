//! The dev server serving a freshly built project.

use outeria_core::config::ProjectConfig;
use outeria_core::{dev, scaffold, BuildOptions, Pipeline};
use tempfile::tempdir;

#[tokio::test]
async fn test_serves_built_project() {
    let dir = tempdir().unwrap();
    scaffold::init(dir.path(), false).unwrap();

    let mut config = ProjectConfig::load(dir.path()).unwrap();
    config.server.port = 0;
    Pipeline::new(config.clone())
        .run(BuildOptions::production())
        .unwrap();

    let server = dev::bind(&config).await.unwrap();
    let base = format!("http://{}", server.local_addr());
    tokio::spawn(server.run_until(std::future::pending()));
    let client = reqwest::Client::new();

    let page = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert!(page.text().await.unwrap().contains("Outeria.initialize(document.body);"));

    let bundle = client
        .get(format!("{base}/dist/outeria.min.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(bundle.status(), 200);
    assert_eq!(
        bundle.bytes().await.unwrap().as_ref(),
        std::fs::read(dir.path().join("dist/outeria.min.js")).unwrap()
    );

    let css = client
        .get(format!("{base}/dist/outeria.min.css"))
        .send()
        .await
        .unwrap();
    assert_eq!(css.status(), 200);
    assert!(css.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));

    let head = client
        .head(format!("{base}/dist/outeria.min.js.map"))
        .send()
        .await
        .unwrap();
    assert_eq!(head.status(), 200);

    for missing in ["/missing.html", "/dist/missing.js", "/dist/../outeria.json"] {
        let response = client.get(format!("{base}{missing}")).send().await.unwrap();
        assert_eq!(response.status(), 404, "{missing}");
    }
}

#[tokio::test]
async fn test_reflects_rebuilds_without_restart() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("dist")).unwrap();
    std::fs::write(dir.path().join("dist/outeria.min.js"), "first").unwrap();

    let mut config = ProjectConfig::with_root(dir.path());
    config.server.port = 0;
    let server = dev::bind(&config).await.unwrap();
    let url = format!("http://{}/dist/outeria.min.js", server.local_addr());
    tokio::spawn(server.run_until(std::future::pending()));
    let client = reqwest::Client::new();

    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "first");
    std::fs::write(dir.path().join("dist/outeria.min.js"), "second").unwrap();
    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "second");
}
