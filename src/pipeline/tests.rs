use super::*;
use crate::ingest::Chunk;
use crate::providers::Embedder;
use crate::store::{MemoryStore, VectorStore};
use anyhow::Result;
use std::sync::Mutex as StdMutex;

struct ConstantEmbedder;

impl Embedder for ConstantEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.5]).collect())
    }
}

/// Records the prompt and replies with a fixed answer.
struct RecordingModel {
    reply: String,
    prompts: StdMutex<Vec<String>>,
}

impl RecordingModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: StdMutex::new(Vec::new()),
        }
    }
}

impl ChatModel for RecordingModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

struct FailingModel;

impl ChatModel for FailingModel {
    fn complete(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("rate limited")
    }
}

fn scored(content: &str, source: &str, page: Option<u32>) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk {
            content: content.to_string(),
            source: source.to_string(),
            page,
            chunk_index: 0,
        },
        score: 1.0,
    }
}

fn indexed_collection(contents: &[&str]) -> (Arc<IndexClient>, Collection) {
    let (index, collection, _store) = indexed_in_memory(contents);
    (index, collection)
}

fn indexed_in_memory(contents: &[&str]) -> (Arc<IndexClient>, Collection, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(IndexClient::new(Arc::new(ConstantEmbedder), store.clone()));
    let collection = Collection::generate();
    let chunks: Vec<Chunk> = contents
        .iter()
        .enumerate()
        .map(|(chunk_index, content)| Chunk {
            content: content.to_string(),
            source: "sky.txt".to_string(),
            page: None,
            chunk_index,
        })
        .collect();
    index.index(&chunks, &collection).expect("index should succeed");
    (index, collection, store)
}

#[test]
fn answer_is_trimmed_and_prompt_holds_context() {
    let (index, collection) = indexed_collection(&["The sky is blue."]);
    let model = Arc::new(RecordingModel::new("\n  The sky is blue.  \n"));
    let pipeline = Pipeline::new(index, collection, model.clone(), 4);

    let answer = pipeline
        .answer("What color is the sky?")
        .expect("answer should succeed");

    assert_eq!(answer.answer, "The sky is blue.");
    assert_eq!(answer.sources, "sky.txt");

    let prompts = model.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Summary: The sky is blue.\nQuestion: What color is the sky?"));
}

#[test]
fn top_k_limits_context() {
    let contents = ["one", "two", "three", "four", "five", "six"];
    let (index, collection) = indexed_collection(&contents);
    let model = Arc::new(RecordingModel::new("ok"));
    let pipeline = Pipeline::new(index, collection, model.clone(), 4);

    pipeline.answer("anything").expect("answer should succeed");

    let prompts = model.prompts.lock().expect("lock should not be poisoned");
    let included = contents
        .iter()
        .filter(|content| prompts[0].contains(&format!("{}\n", content)))
        .count();
    assert_eq!(included, 4);
}

#[test]
fn model_failure_is_dependency_unavailable() {
    let (index, collection) = indexed_collection(&["The sky is blue."]);
    let pipeline = Pipeline::new(index, collection, Arc::new(FailingModel), 4);

    let result = pipeline.answer("What color is the sky?");

    match result {
        Err(DocQueryError::DependencyUnavailable(message)) => {
            assert!(message.contains("rate limited"), "got: {}", message);
        }
        other => panic!("expected DependencyUnavailable, got {:?}", other),
    }
}

#[test]
fn sources_are_unique_and_ordered() {
    let hits = vec![
        scored("a", "report.pdf", Some(2)),
        scored("b", "notes.md", None),
        scored("c", "report.pdf", Some(2)),
        scored("d", "report.pdf", Some(1)),
    ];

    assert_eq!(
        format_sources(&hits),
        "report.pdf (page 2), notes.md, report.pdf (page 1)"
    );
    assert_eq!(format_context(&hits), "a\n\nb\n\nc\n\nd");
    assert_eq!(format_sources(&[]), "");
}

#[test]
fn slot_starts_absent_and_replaces() {
    let slot = PipelineSlot::new();
    assert!(!slot.is_bound());
    assert!(slot.current().is_none());

    let (index, first) = indexed_collection(&["first"]);
    let model: Arc<dyn ChatModel> = Arc::new(RecordingModel::new("ok"));
    assert!(
        slot.replace(Pipeline::new(index.clone(), first.clone(), model.clone(), 4))
            .is_none()
    );
    assert!(slot.is_bound());

    let second = Collection::generate();
    let previous = slot
        .replace(Pipeline::new(index, second.clone(), model, 4))
        .expect("first pipeline should be handed back");

    assert_eq!(previous.collection(), &first);
    let current = slot.current().expect("slot should be bound");
    assert_eq!(current.collection(), &second);
}

#[test]
fn readers_keep_their_pipeline_across_replacement() {
    let slot = PipelineSlot::new();
    let (index, first) = indexed_collection(&["The sky is blue."]);
    let model: Arc<dyn ChatModel> = Arc::new(RecordingModel::new("blue"));
    slot.replace(Pipeline::new(index.clone(), first.clone(), model.clone(), 4));

    let held = slot.current().expect("slot should be bound");
    slot.replace(Pipeline::new(index, Collection::generate(), model, 4));

    assert_eq!(held.collection(), &first);
    let answer = held.answer("sky?").expect("old pipeline still answers");
    assert_eq!(answer.answer, "blue");
}

#[test]
fn custom_prompt_template_is_used() {
    let (index, collection) = indexed_collection(&["The sky is blue."]);
    let model = Arc::new(RecordingModel::new("blue"));
    let pipeline = Pipeline::new(index, collection, model.clone(), 4)
        .with_prompt(PromptTemplate::new("Q: {input}\nC: {context}"));

    pipeline.answer("Sky?").expect("answer should succeed");

    let prompts = model.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts[0], "Q: Sky?\nC: The sky is blue.");
}

#[test]
fn retired_collection_is_dropped_with_the_last_reader() {
    let slot = PipelineSlot::new();
    let (index, first, store) = indexed_in_memory(&["The sky is blue."]);
    let model: Arc<dyn ChatModel> = Arc::new(RecordingModel::new("blue"));
    slot.replace(Pipeline::new(index.clone(), first.clone(), model.clone(), 4));
    let reader = slot.current().expect("slot should be bound");

    let second = Collection::generate();
    index
        .index(
            &[Chunk {
                content: "Grass is green.".to_string(),
                source: "grass.txt".to_string(),
                page: None,
                chunk_index: 0,
            }],
            &second,
        )
        .expect("index should succeed");
    let previous = slot
        .replace(Pipeline::new(index, second.clone(), model, 4))
        .expect("first pipeline should be handed back");
    assert!(previous.is_retired());
    drop(previous);

    // A reader that took the old pipeline still finishes against it
    assert_eq!(store.len(&first), 1);
    let answer = reader.answer("sky?").expect("old pipeline still answers");
    assert_eq!(answer.sources, "sky.txt");

    drop(reader);
    assert_eq!(store.collection_names(), vec![second.name.clone()]);
    assert!(!slot.current().expect("slot should be bound").is_retired());
}

#[test]
fn shared_types_are_send_sync() {
    fn assert_send_sync<T: Send + Sync + ?Sized>() {}
    assert_send_sync::<dyn VectorStore>();
    assert_send_sync::<PipelineSlot>();
}
