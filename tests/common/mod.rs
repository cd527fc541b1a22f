//! Shared helpers for integration tests: hand-built PDFs, scripted
//! providers, and a server launcher bound to a free port.

#![allow(dead_code)]

use async_trait::async_trait;
use doc_qa::config::Config;
use doc_qa::embedding::HashEmbedder;
use doc_qa::generation::{Generation, Generator};
use doc_qa::models::Language;
use doc_qa::server::run_server_with_providers;
use doc_qa::service::Providers;
use doc_qa::translate::Translator;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// PDF with one page per entry of `pages`, each drawing its text in Helvetica.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let font_id = 3 + 2 * pages.len();
    let mut objects: Vec<String> = Vec::new();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        pages.len()
    ));
    for (i, text) in pages.iter().enumerate() {
        let page_id = 3 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
            page_id + 1,
            font_id
        ));
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", escape_pdf_string(text));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn escape_pdf_string(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Returns the prompt it was given, so responses show what was asked.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub suffix: Option<String>,
}

impl EchoGenerator {
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            suffix: Some(suffix.to_string()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<Generation> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let text = match &self.suffix {
            Some(suffix) => format!("{} {}", prompt, suffix),
            None => prompt.to_string(),
        };
        Ok(Generation {
            text,
            truncated: false,
        })
    }
}

/// Fixed two-phrase dictionary; anything else is prefixed with the target tag.
#[derive(Default)]
pub struct DictionaryTranslator {
    pub calls: Mutex<Vec<(String, Language, Language)>>,
}

pub const NEPALI_QUESTION: &str = "नेपालको राजधानी कहाँ हो?";
pub const ENGLISH_QUESTION: &str = "Where is the capital of Nepal?";

impl DictionaryTranslator {
    pub fn calls(&self) -> Vec<(String, Language, Language)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    fn name(&self) -> &str {
        "dictionary"
    }

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source, target));
        if text == NEPALI_QUESTION {
            return Ok(ENGLISH_QUESTION.to_string());
        }
        Ok(format!("[{}] {}", target, text))
    }
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

pub fn test_config(tmp: &TempDir, port: u16) -> Config {
    let mut cfg = Config::default();
    cfg.server.bind = format!("127.0.0.1:{}", port);
    cfg.storage.upload_dir = tmp.path().join("uploads");
    cfg.storage.clear_backoff_ms = 10;
    cfg.chunking.chunk_size = 200;
    cfg.chunking.overlap = 40;
    cfg
}

pub struct TestServer {
    pub base: String,
    pub config: Config,
    pub generator: Arc<EchoGenerator>,
    pub translator: Arc<DictionaryTranslator>,
    pub handle: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(EchoGenerator::default()).await
    }

    pub async fn start_with(generator: EchoGenerator) -> Self {
        Self::start_configured(generator, |_| {}).await
    }

    /// Start with `adjust` applied on top of [`test_config`].
    pub async fn start_configured(generator: EchoGenerator, adjust: impl FnOnce(&mut Config)) -> Self {
        let port = find_free_port();
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp, port);
        adjust(&mut config);

        let generator = Arc::new(generator);
        let translator = Arc::new(DictionaryTranslator::default());
        let providers = Providers {
            embedder: Arc::new(HashEmbedder::new(256)),
            generator: generator.clone(),
            translator: translator.clone(),
        };

        let cfg = config.clone();
        let handle = tokio::spawn(async move {
            run_server_with_providers(&cfg, providers).await.ok();
        });
        wait_for_server(port).await;

        Self {
            base: format!("http://127.0.0.1:{}", port),
            config,
            generator,
            translator,
            handle,
            _tmp: tmp,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn upload_dir_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.config.storage.upload_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
