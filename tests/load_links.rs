use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kuronime::kuronime_core::crypto::{BLOCK_SIZE, encrypt, encrypt_envelope};
use kuronime::kuronime_core::{Extractor, ExtractorLink, LinkKind, Quality, SubtitleFile};
use kuronime::{KEY, KuronimeBuilder, KuronimeClient, KuronimeError};

const EPISODE_PATH: &str = "/nonton-frieren-episode-1/";

const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720/index.m3u8
";

fn encoded_id() -> String {
    "QUJD".repeat(40)
}

fn episode_page(id: &str) -> String {
    format!(
        r#"<html><body><div id="content">
            <script>var ads = "x";</script>
            <script>var is_singular = true; var _0xa1 = "{id}";</script>
        </div></body></html>"#
    )
}

/// encrypts `plaintext` the way the sources api does, space padding the last block.
fn seal(plaintext: &str) -> String {
    let mut bytes = plaintext.as_bytes().to_vec();
    let rem = bytes.len() % BLOCK_SIZE;
    if rem != 0 {
        bytes.resize(bytes.len() + BLOCK_SIZE - rem, b' ');
    }
    encrypt(&bytes, KEY).expect("aligned plaintext encrypts")
}

async fn mount_episode(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(EPISODE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(episode_page(&encoded_id())))
        .mount(server)
        .await;
}

async fn mount_sources(server: &MockServer, body: serde_json::Value) {
    let referer = format!("{}/", server.uri());
    Mock::given(method("POST"))
        .and(path("/api/v9/sources"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(header("referer", referer.as_str()))
        .and(body_json(serde_json::json!({ "id": encoded_id() })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

struct CountingExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl Extractor for CountingExtractor {
    fn name(&self) -> &str {
        "Counting"
    }

    fn main_url(&self) -> &str {
        "https://embed.test"
    }

    async fn get_url(
        &self,
        url: &str,
        referer: Option<&str>,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> kuronime::kuronime_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        on_subtitle(SubtitleFile {
            lang: "id".to_string(),
            url: format!("{url}.vtt"),
        });
        on_link(ExtractorLink::new(
            self.name(),
            format!("{url}/video.mp4"),
            referer.unwrap_or_default(),
            Quality::Unknown,
        ));
        Ok(())
    }
}

fn client(server: &MockServer, extractor: Option<Arc<CountingExtractor>>) -> KuronimeClient {
    let mut builder = KuronimeBuilder::new()
        .main_url(&server.uri())
        .api_url(&server.uri())
        .generic_fallback(false);
    if let Some(extractor) = extractor {
        builder = builder.extractor(extractor);
    }
    builder.build().expect("mock urls are valid")
}

async fn collect(
    kuronime: &KuronimeClient,
    url: &str,
) -> (kuronime::Result<bool>, Vec<ExtractorLink>, Vec<SubtitleFile>) {
    let links = Mutex::new(Vec::new());
    let subs = Mutex::new(Vec::new());
    let result = kuronime
        .load_links(
            url,
            &|sub| subs.lock().expect("lock").push(sub),
            &|link| links.lock().expect("lock").push(link),
        )
        .await;
    (
        result,
        links.into_inner().expect("lock"),
        subs.into_inner().expect("lock"),
    )
}

#[tokio::test]
async fn source_only_expands_manifest() {
    let server = MockServer::start().await;
    mount_episode(&server).await;

    let manifest = format!("{}/hls/master.m3u8", server.uri());
    let src = seal(&serde_json::to_string(&manifest).expect("string encodes"));
    mount_sources(&server, serde_json::json!({ "src": src })).await;

    Mock::given(method("GET"))
        .and(path("/hls/master.m3u8"))
        .and(header("origin", server.uri().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = Arc::new(CountingExtractor {
        calls: AtomicUsize::new(0),
    });
    let kuronime = client(&server, Some(Arc::clone(&extractor)));
    let url = format!("{}{EPISODE_PATH}", server.uri());

    let (result, mut links, subs) = collect(&kuronime, &url).await;

    assert!(result.expect("links load"));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(subs.is_empty());

    links.sort_by_key(|l| l.quality);
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].quality, Quality::Height(360));
    assert_eq!(links[1].quality, Quality::Height(720));
    assert!(links.iter().all(|l| l.kind == LinkKind::M3u8));
    assert!(links.iter().all(|l| l.source == "Kuronime+"));
    assert!(
        links
            .iter()
            .all(|l| l.referer == format!("{}/", server.uri()))
    );
}

#[tokio::test]
async fn envelope_source_wrapping_an_object_resolves() {
    let server = MockServer::start().await;
    mount_episode(&server).await;

    let manifest = format!("{}/hls/1080.m3u8", server.uri());
    let wrapped = serde_json::json!({ "src": manifest }).to_string();
    let quoted = serde_json::to_string(&wrapped).expect("string encodes");
    let src = encrypt_envelope(quoted.as_bytes(), KEY, b"saltsalt").expect("envelope encrypts");
    mount_sources(&server, serde_json::json!({ "src": src, "mirror": null })).await;

    Mock::given(method("GET"))
        .and(path("/hls/1080.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\nseg0.ts\n#EXT-X-ENDLIST\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let kuronime = client(&server, None);
    let url = format!("{}{EPISODE_PATH}", server.uri());
    let (result, links, _) = collect(&kuronime, &url).await;

    assert!(result.expect("links load"));
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, manifest);
    assert_eq!(links[0].kind, LinkKind::M3u8);
}

#[tokio::test]
async fn mirror_embeds_get_quality_hints() {
    let server = MockServer::start().await;
    mount_episode(&server).await;

    let mirror = seal(r#"{"embed":{"v720":"https://embed.test/e/a","v480":"https://embed.test/e/b"}}"#);
    mount_sources(
        &server,
        serde_json::json!({ "src": "not base64 !", "mirror": mirror }),
    )
    .await;

    let extractor = Arc::new(CountingExtractor {
        calls: AtomicUsize::new(0),
    });
    let kuronime = client(&server, Some(Arc::clone(&extractor)));
    let url = format!("{}{EPISODE_PATH}", server.uri());

    let (result, mut links, subs) = collect(&kuronime, &url).await;

    assert!(result.expect("a broken src does not fail the call"));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(subs.len(), 2);

    links.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].url, "https://embed.test/e/a/video.mp4");
    assert_eq!(links[0].quality, Quality::Height(720));
    assert_eq!(links[1].url, "https://embed.test/e/b/video.mp4");
    assert_eq!(links[1].quality, Quality::Height(480));
    assert!(
        links
            .iter()
            .all(|l| l.referer == format!("{}/", server.uri()))
    );
}

#[tokio::test]
async fn page_without_payload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPISODE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<div id="content"><script>var is_singular = "short";</script></div>"#),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v9/sources"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let kuronime = client(&server, None);
    let url = format!("{}{EPISODE_PATH}", server.uri());
    let (result, links, _) = collect(&kuronime, &url).await;

    assert!(matches!(result, Err(KuronimeError::PayloadNotFound)));
    assert!(links.is_empty());
}

#[tokio::test]
async fn failed_page_request_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPISODE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let kuronime = client(&server, None);
    let url = format!("{}{EPISODE_PATH}", server.uri());
    let (result, _, _) = collect(&kuronime, &url).await;

    let err = result.expect_err("500 must fail");
    assert!(err.is_fetch());
}

#[tokio::test]
async fn failed_sources_request_is_a_fetch_error() {
    let server = MockServer::start().await;
    mount_episode(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v9/sources"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let kuronime = client(&server, None);
    let url = format!("{}{EPISODE_PATH}", server.uri());
    let (result, _, _) = collect(&kuronime, &url).await;

    assert!(result.expect_err("502 must fail").is_fetch());
}

#[tokio::test]
async fn empty_sources_response_resolves_nothing() {
    let server = MockServer::start().await;
    mount_episode(&server).await;
    mount_sources(&server, serde_json::json!({ "src": null })).await;

    let kuronime = client(&server, None);
    let url = format!("{}{EPISODE_PATH}", server.uri());
    let (result, links, subs) = collect(&kuronime, &url).await;

    assert!(!result.expect("nothing to resolve is not an error"));
    assert!(links.is_empty());
    assert!(subs.is_empty());
}
