// Shared test doubles for the integration suites
#![allow(dead_code)]

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use doc_query::config::Config;
use doc_query::index::IndexClient;
use doc_query::providers::{ChatModel, Embedder};
use doc_query::service::DocumentService;
use doc_query::store::VectorStore;

const DIMENSIONS: usize = 256;

/// Bag-of-words embedding: every lowercase word is hashed into one of 256 buckets.
#[derive(Debug, Default)]
pub struct HashingEmbedder {
    failing: AtomicBool,
    query_delay_ms: AtomicU64,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every query embedding for `delay` before answering.
    pub fn set_query_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.query_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % DIMENSIONS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl Embedder for HashingEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service returned HTTP 503: overloaded");
        }
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let delay = self.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        let mut vectors = self.embed_documents(&[text.to_string()])?;
        Ok(vectors.remove(0))
    }
}

/// Answers with the context it was given, which is enough to check grounding.
#[derive(Debug, Default)]
pub struct ExtractiveModel;

impl ChatModel for ExtractiveModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        let context = prompt
            .split_once("Summary: ")
            .and_then(|(_, rest)| rest.split_once("\nQuestion:"))
            .map(|(context, _)| context)
            .unwrap_or("I don't know.");
        Ok(format!("  {}\n", context))
    }
}

#[derive(Debug, Default)]
pub struct FailingModel;

impl ChatModel for FailingModel {
    fn complete(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("language model timed out")
    }
}

/// Configuration whose upload directory lives in a fresh temp dir.
pub fn test_config() -> (Config, TempDir) {
    let dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::default();
    config.server.upload_dir = dir.path().join("uploaded_files");
    (config, dir)
}

pub fn service_with(
    embedder: Arc<HashingEmbedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
) -> (DocumentService, TempDir) {
    let (config, dir) = test_config();
    let index = IndexClient::new(embedder, store);
    (DocumentService::new(&config, Some(index), model), dir)
}

/// A small PDF with one line of text per page.
pub fn pdf_bytes(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("should encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("should serialize pdf");
    bytes
}
