use providers::{ClassificationOracle, OracleInput, ProviderError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tagger_core::cache::CacheStore;
use tagger_core::config::AppConfig;
use tagger_core::pipeline::{Pipeline, PipelineMode};
use tagger_core::PipelineError;
use tempfile::{tempdir, TempDir};
use tokio::sync::Notify;

type Script = dyn Fn(&str) -> Result<Vec<String>, ProviderError> + Send + Sync;

/// Answers from the text content; counts calls and peak parallelism.
struct ScriptedOracle {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedOracle {
    fn new(script: impl Fn(&str) -> Result<Vec<String>, ProviderError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn classify(
        &self,
        input: &OracleInput,
        _allowed: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let text = match input {
            OracleInput::Text(t) => t.as_str(),
            _ => "",
        };
        let answer = (self.script)(text);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Fixture {
    _temp: TempDir,
    input: PathBuf,
    config: AppConfig,
}

impl Fixture {
    fn new(allowed: &[&str]) -> Self {
        let temp = tempdir().unwrap();
        let input = temp.path().join("input");
        fs::create_dir_all(&input).unwrap();
        let mut config = AppConfig::default();
        config.target_folder = input.to_string_lossy().into_owned();
        config.allowed_keys = allowed.iter().map(|s| s.to_string()).collect();
        config.cache.dir = temp.path().join("cache").to_string_lossy().into_owned();
        Self {
            _temp: temp,
            input,
            config,
        }
    }

    fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.input.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, body).unwrap();
        key(&path)
    }

    async fn pipeline(&self, oracle: Arc<dyn ClassificationOracle>) -> Pipeline {
        let cache = CacheStore::open(&self.config).await.unwrap();
        Pipeline::new(self.config.clone(), cache, oracle)
    }
}

fn key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn set_mtime(path: &Path, secs: u64) {
    set_mtime_nanos(path, secs, 0);
}

fn set_mtime_nanos(path: &Path, secs: u64, nanos: u32) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::new(secs, nanos))
        .unwrap();
}

fn tags(list: &[&str]) -> Result<Vec<String>, ProviderError> {
    Ok(list.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
async fn invoice_lands_under_finance() {
    let fx = Fixture::new(&["finance", "pets"]);
    let invoice = fx.write("invoice.txt", "invoice total $42");
    let oracle = Arc::new(ScriptedOracle::new(|text| {
        if text.contains("invoice") {
            tags(&["finance"])
        } else {
            tags(&[])
        }
    }));
    let pipeline = fx.pipeline(oracle.clone()).await;

    let summary = pipeline.run(PipelineMode::All).await.unwrap();
    assert_eq!(summary.newly_analyzed(), 1);
    assert_eq!(summary.tags, Some(1));

    let forward = pipeline.cache().load_forward().await;
    assert_eq!(forward.len(), 1);
    let record = &forward[&path_str(&invoice)];
    assert_eq!(record.tags, vec!["finance"]);
    assert_eq!(record.display_name, "invoice.txt");

    let reverse = pipeline.cache().load_reverse().await;
    assert_eq!(
        reverse.into_iter().collect::<Vec<_>>(),
        vec![("finance".to_string(), vec![path_str(&invoice)])]
    );

    let view = pipeline.presentation_view().await;
    assert_eq!(view.len(), 1);
    assert_eq!(view["finance"][0].name, "invoice.txt");
    assert_eq!(view["finance"][0].all_keys, vec!["finance"]);
}

#[tokio::test]
async fn second_run_without_changes_does_nothing() {
    let fx = Fixture::new(&["finance"]);
    fx.write("a.txt", "alpha");
    fx.write("nested/b.txt", "beta");
    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&["finance"])));
    let pipeline = fx.pipeline(oracle.clone()).await;

    let first = pipeline.run_map().await.unwrap();
    assert_eq!(first.processed, 2);
    let before = pipeline.cache().load_forward().await;

    let second = pipeline.run_map().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.stale, 0);
    assert_eq!(second.discovered, 2);
    assert_eq!(oracle.calls(), 2);
    assert_eq!(pipeline.cache().load_forward().await, before);
}

#[tokio::test]
async fn subsecond_mtimes_survive_the_cache() {
    let fx = Fixture::new(&["finance"]);
    for i in 0..200u32 {
        let path = fx.write(&format!("f{i:03}.txt"), "same");
        // Spread nanos so many values need all 17 significant digits.
        let nanos = (u64::from(i) * 999_999_937 % 1_000_000_000) as u32;
        set_mtime_nanos(&path, 1_760_000_000 + u64::from(i), nanos);
    }
    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&["finance"])));
    let pipeline = fx.pipeline(oracle.clone()).await;

    let first = pipeline.run_map().await.unwrap();
    assert_eq!(first.processed, 200);

    let second = pipeline.run_map().await.unwrap();
    assert_eq!(second.stale, 0);
    assert_eq!(second.processed, 0);
    assert_eq!(oracle.calls(), 200);
}

#[tokio::test]
async fn touched_file_is_reclassified_and_untouched_is_not() {
    let fx = Fixture::new(&["old", "new"]);
    let touched = fx.write("touched.txt", "one");
    let untouched = fx.write("untouched.txt", "two");
    set_mtime(&touched, 1_000);
    set_mtime(&untouched, 1_000);

    let answer = Arc::new(std::sync::Mutex::new("old"));
    let script_answer = answer.clone();
    let oracle = Arc::new(ScriptedOracle::new(move |_| {
        tags(&[*script_answer.lock().unwrap()])
    }));
    let pipeline = fx.pipeline(oracle.clone()).await;
    assert_eq!(pipeline.run_map().await.unwrap().processed, 2);

    *answer.lock().unwrap() = "new";
    set_mtime(&touched, 2_000);
    let summary = pipeline.run_map().await.unwrap();
    assert_eq!(summary.processed, 1);

    let forward = pipeline.cache().load_forward().await;
    let touched_rec = &forward[&path_str(&touched)];
    assert_eq!(touched_rec.tags, vec!["new"]);
    assert_eq!(touched_rec.mtime, 2_000.0);
    assert_eq!(forward[&path_str(&untouched)].tags, vec!["old"]);
    assert_eq!(forward[&path_str(&untouched)].mtime, 1_000.0);
}

#[tokio::test]
async fn stored_tags_are_sorted_regardless_of_oracle_order() {
    let fx = Fixture::new(&["finance", "pets", "work"]);
    let file = fx.write("mixed.txt", "cat receipts");
    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&["work", "pets", "finance"])));
    let pipeline = fx.pipeline(oracle).await;
    pipeline.run(PipelineMode::All).await.unwrap();

    let forward = pipeline.cache().load_forward().await;
    assert_eq!(
        forward[&path_str(&file)].tags,
        vec!["finance", "pets", "work"]
    );
}

#[tokio::test]
async fn failing_files_get_no_record_and_are_retried() {
    let fx = Fixture::new(&["ok"]);
    let mut good = Vec::new();
    let mut bad = Vec::new();
    for i in 0..3 {
        good.push(fx.write(&format!("good{i}.txt"), "fine"));
    }
    bad.push(fx.write("bad0.txt", "fail: transport"));
    bad.push(fx.write("bad1.txt", "fail: garbage"));

    let oracle = Arc::new(ScriptedOracle::new(|text| {
        if text.contains("transport") {
            Err(ProviderError::RequestFailed("connection reset".into()))
        } else if text.contains("garbage") {
            Err(ProviderError::MalformedResponse("not json".into()))
        } else {
            tags(&["ok"])
        }
    }));
    let pipeline = fx.pipeline(oracle.clone()).await;

    let summary = pipeline.run_map().await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(pipeline.progress().completed, 5);

    let forward = pipeline.cache().load_forward().await;
    assert_eq!(forward.len(), 3);
    for path in &good {
        assert!(forward.contains_key(&path_str(path)));
    }
    for path in &bad {
        assert!(!forward.contains_key(&path_str(path)));
    }

    let retry = pipeline.run_map().await.unwrap();
    assert_eq!(retry.stale, 2);
    assert_eq!(retry.processed, 0);
    assert_eq!(oracle.calls(), 7);
}

#[tokio::test]
async fn bounded_pool_loses_no_updates() {
    let fx = Fixture::new(&["n"]);
    let mut config = fx.config.clone();
    config.pipeline.concurrency = 3;
    let files: Vec<PathBuf> = (0..12)
        .map(|i| fx.write(&format!("f{i:02}.txt"), &format!("file {i}")))
        .collect();

    let oracle = Arc::new(
        ScriptedOracle::new(|text| Ok(vec![text.replace(' ', "-")]))
            .with_delay(Duration::from_millis(20)),
    );
    let cache = CacheStore::open(&config).await.unwrap();
    let pipeline = Pipeline::new(config, cache, oracle.clone());

    let summary = pipeline.run_map().await.unwrap();
    assert_eq!(summary.processed, 12);
    assert!(oracle.peak.load(Ordering::SeqCst) <= 3);

    let forward = pipeline.cache().load_forward().await;
    assert_eq!(forward.len(), 12);
    for (i, path) in files.iter().enumerate() {
        assert_eq!(forward[&path_str(path)].tags, vec![format!("file-{i}")]);
    }
    assert_eq!(
        pipeline.progress(),
        tagger_core::progress::ProgressState {
            total: 12,
            completed: 12
        }
    );
}

#[tokio::test]
async fn clear_all_empties_both_indices() {
    let fx = Fixture::new(&["finance"]);
    fx.write("a.txt", "invoice");
    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&["finance"])));
    let pipeline = fx.pipeline(oracle.clone()).await;
    pipeline.run(PipelineMode::All).await.unwrap();
    assert!(!pipeline.cache().load_forward().await.is_empty());
    assert!(!pipeline.cache().load_reverse().await.is_empty());

    pipeline.clear_all().await.unwrap();
    assert!(pipeline.cache().load_forward().await.is_empty());
    assert!(pipeline.cache().load_reverse().await.is_empty());

    // Everything is stale again.
    assert_eq!(pipeline.run_map().await.unwrap().processed, 1);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn corrupt_forward_cache_is_a_cold_start() {
    let fx = Fixture::new(&["finance"]);
    fx.write("a.txt", "invoice");
    let cache_dir = PathBuf::from(&fx.config.cache.dir);
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("file-to-key.json"), "{\"truncated\": ").unwrap();

    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&["finance"])));
    let pipeline = fx.pipeline(oracle).await;
    let summary = pipeline.run_map().await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(pipeline.cache().load_forward().await.len(), 1);
}

#[tokio::test]
async fn missing_root_fails_the_run() {
    let mut fx = Fixture::new(&[]);
    fx.config.target_folder = fx.input.join("missing").to_string_lossy().into_owned();
    let oracle = Arc::new(ScriptedOracle::new(|_| tags(&[])));
    let pipeline = fx.pipeline(oracle).await;

    let err = pipeline.run(PipelineMode::All).await.unwrap_err();
    assert!(matches!(err, PipelineError::RootUnavailable { .. }));
}

#[tokio::test]
async fn reduce_drops_tags_that_no_longer_occur() {
    let fx = Fixture::new(&["a", "b"]);
    let file = fx.write("x.txt", "x");
    set_mtime(&file, 10);
    let answer = Arc::new(std::sync::Mutex::new(vec!["a", "b"]));
    let script_answer = answer.clone();
    let oracle = Arc::new(ScriptedOracle::new(move |_| {
        tags(&script_answer.lock().unwrap())
    }));
    let pipeline = fx.pipeline(oracle).await;
    pipeline.run(PipelineMode::All).await.unwrap();
    assert_eq!(pipeline.cache().load_reverse().await.len(), 2);

    *answer.lock().unwrap() = vec!["b"];
    set_mtime(&file, 20);
    pipeline.run(PipelineMode::All).await.unwrap();
    let reverse = pipeline.cache().load_reverse().await;
    assert_eq!(reverse.keys().collect::<Vec<_>>(), vec!["b"]);
}

/// Blocks inside `classify` until released.
struct GatedOracle {
    started: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl ClassificationOracle for GatedOracle {
    async fn classify(
        &self,
        _input: &OracleInput,
        _allowed: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(vec![])
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[tokio::test]
async fn overlapping_runs_are_refused() {
    let fx = Fixture::new(&[]);
    fx.write("slow.txt", "slow");
    let oracle = Arc::new(GatedOracle {
        started: Notify::new(),
        release: Notify::new(),
    });
    let pipeline = Arc::new(fx.pipeline(oracle.clone()).await);

    let running = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(PipelineMode::All).await })
    };
    oracle.started.notified().await;

    assert!(matches!(pipeline.run_map().await, Err(PipelineError::Busy)));
    assert!(matches!(pipeline.clear_all().await, Err(PipelineError::Busy)));
    assert_eq!(pipeline.progress().total, 1);

    oracle.release.notify_one();
    let summary = running.await.unwrap().unwrap();
    assert_eq!(summary.newly_analyzed(), 1);
}
