//! Runtime lifecycle: start-up, entry handling, inspection, and tooling hooks.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::{home_runtime, init_tracing, layout, load, name, text};
use pretty_assertions::assert_eq;
use stasis_bridge::MemoryClient;
use stasis_runtime::{
	BridgeMessage, LoadPhase, MemoryTarget, ReloadOutcome, RenderNode, Runtime, RuntimeConfig, RuntimeError, ViewDecl,
	ViewError, view_fn,
};

/// Must render a visible notice when the entry view was never defined.
///
/// - Enforced in: `Runtime::run` (entry slot)
/// - Failure symptom: an empty page with no hint of what is missing.
#[test]
fn test_missing_entry_renders_notice() {
	init_tracing();
	let mut rt = Runtime::new(RuntimeConfig::default());
	rt.run();
	assert!(rt.tree().to_markup().contains("Entry view Main is not defined"));
	assert!(rt.root().unwrap().slot().is_placeholder());
}

/// Must replay the entry's last good render after its file is deleted, and
/// pick the real definition up again once it returns.
///
/// - Enforced in: `Runtime::run` (entry slot), `Runtime::delete_file`
/// - Failure symptom: deleting and restoring the entry file blanks the app.
#[test]
fn test_deleted_entry_shows_last_working_render() {
	let mut rt = home_runtime();
	rt.delete_file("main.src");

	let markup = rt.tree().to_markup();
	assert!(markup.contains("Entry view Main is missing, showing its last working render"));
	assert!(markup.contains(">nav</sidebar>"));
	assert!(rt.mounted(&name("Sidebar")).is_empty());

	let report = load(&mut rt, "main.src", vec![layout("Main", "main-v1", &["Footer"])]).unwrap();
	assert_eq!(report.outcome, ReloadOutcome::FullRender);
	let markup = rt.tree().to_markup_stripped();
	assert!(!markup.contains("stasisLastWorking"));
	assert!(markup.contains(">bye</footer>"));
}

/// Must finish every preloader before the first pass renders.
///
/// - Enforced in: `Runtime::start`
/// - Failure symptom: views render before the data they read is loaded.
#[tokio::test]
async fn test_start_joins_preloaders_first() {
	init_tracing();
	let ready = Arc::new(AtomicUsize::new(0));
	let seen = Arc::new(AtomicUsize::new(usize::MAX));

	let mut rt = Runtime::new(RuntimeConfig::default());
	for _ in 0..3 {
		let ready = Arc::clone(&ready);
		rt.preload(async move {
			tokio::task::yield_now().await;
			ready.fetch_add(1, Ordering::SeqCst);
			Ok(())
		});
	}
	let (probe, observed) = (Arc::clone(&ready), Arc::clone(&seen));
	rt.load_file("main.src", |scope| {
		scope.define(ViewDecl::new(
			"Main",
			"main",
			view_fn(move |_| {
				observed.store(probe.load(Ordering::SeqCst), Ordering::SeqCst);
				Ok(RenderNode::text("ready"))
			}),
		))
	})
	.unwrap();

	rt.start().await.unwrap();
	assert_eq!(seen.load(Ordering::SeqCst), 3);
	assert!(rt.root().unwrap().is_mounted());
}

/// Must not render when a preloader fails.
#[tokio::test]
async fn test_failed_preloader_aborts_start() {
	let mut rt = Runtime::new(RuntimeConfig::default());
	rt.preload(async { Ok(()) });
	rt.preload(async { Err(ViewError::msg("fonts unavailable")) });

	let result = rt.start().await;
	assert!(matches!(result, Err(RuntimeError::Preload(ViewError::Message(ref m))) if m == "fonts unavailable"));
	assert!(rt.root().is_none());
}

/// Must deliver inspector writes to the instance they were made for.
///
/// - Enforced in: `Runtime::inspect`, `Runtime::apply_inspector_writes`
/// - Failure symptom: editing state in the dev tools does nothing.
#[test]
fn test_inspector_write_back() {
	init_tracing();
	let mut rt = Runtime::new(RuntimeConfig::default());
	rt.load_file("main.src", |scope| {
		scope.define(ViewDecl::new(
			"Main",
			"main",
			view_fn(|cx| {
				let title = cx.state().get("title").and_then(|v| v.as_str()).unwrap_or("untitled");
				Ok(RenderNode::text(title.to_string()))
			}),
		))
	})
	.unwrap();
	rt.run();

	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let path = rt.root().unwrap().path().clone();
	rt.inspect(&path, move |_props, state, write_back| {
		counter.fetch_add(1, Ordering::SeqCst);
		if !state.contains_key("title") {
			write_back.write("title", "Inbox");
		}
	});
	assert_eq!(calls.load(Ordering::SeqCst), 1);

	assert_eq!(rt.apply_inspector_writes(), 1);
	assert_eq!(rt.tree().to_markup_stripped(), "<main class=\"ViewMain\">Inbox</main>");
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(rt.apply_inspector_writes(), 0);
}

/// Must keep rendering when an inspector callback panics.
///
/// - Enforced in: `Inspector::notify`
/// - Failure symptom: a broken dev-tools panel takes the app down with it.
#[test]
fn test_panicking_inspector_is_contained() {
	let mut rt = home_runtime();
	let path = rt.root().unwrap().path().clone();
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	rt.inspect(&path, move |_props, _state, _write_back| {
		counter.fetch_add(1, Ordering::SeqCst);
		panic!("panel crashed");
	});

	rt.run();
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert!(rt.root().unwrap().is_mounted());
	assert!(rt.tree().to_markup_stripped().contains(">nav</sidebar>"));
}

/// Must queue bridge events until a client connects, then flush them in
/// order.
#[test]
fn test_bridge_queues_until_connected() {
	let mut rt = home_runtime();
	assert_eq!(rt.bridge().queued(), 3);

	let client = MemoryClient::new();
	rt.bridge_mut().connect(client.clone());
	let kinds: Vec<String> = client
		.received()
		.iter()
		.map(|raw| {
			let value: serde_json::Value = serde_json::from_str(raw).unwrap();
			value["_type"].as_str().unwrap_or_default().to_string()
		})
		.collect();
	assert_eq!(kinds, vec!["runtime:success", "runtime:success", "render:done"]);
	assert_eq!(rt.bridge().queued(), 0);
}

/// Must bound the bridge queue when no client ever connects.
///
/// - Enforced in: `Bridge::message` (queue limit from `RuntimeConfig::bridge_max_queued`)
/// - Failure symptom: memory grows with every pass in an app without dev tools.
#[test]
fn test_bridge_queue_is_bounded_without_client() {
	init_tracing();
	let mut config = RuntimeConfig::default();
	config.bridge_max_queued = 16;
	let mut rt = Runtime::new(config);
	load(&mut rt, "main.src", vec![text("Main", "main", "hi")]).unwrap();
	for _ in 0..1_000 {
		rt.run();
	}
	assert_eq!(rt.bridge().queued(), 16);

	let client = MemoryClient::new();
	rt.bridge_mut().connect(client.clone());
	assert_eq!(client.received().len(), 16);
	assert!(client.received().iter().all(|raw| raw.contains("render:done")));
}

/// Must announce completed passes and patches to listeners.
#[test]
fn test_render_done_per_pass_and_patch() {
	let mut rt = home_runtime();
	let done = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&done);
	rt.bridge_mut().on(move |message| {
		if *message == BridgeMessage::RenderDone {
			counter.fetch_add(1, Ordering::SeqCst);
		}
	});
	let target = MemoryTarget::new();
	rt.set_target(target.clone());

	load(&mut rt, "home.src", vec![text("Sidebar", "sidebar-v2", "menu"), text("Footer", "footer-v1", "bye")]).unwrap();
	rt.run();

	assert_eq!(done.load(Ordering::SeqCst), 2);
	assert_eq!(target.commits(), 2);
	assert!(target.last().unwrap().to_markup_stripped().contains(">menu</sidebar>"));
}

/// Must pick the entry view and update cap from a TOML file.
#[test]
fn test_config_file_drives_runtime() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(file, "entry = \"App\"\nmax_chained_updates = 1").unwrap();
	let config = RuntimeConfig::load(file.path()).unwrap();

	let mut rt = Runtime::new(config);
	assert_eq!(rt.entry(), &name("App"));
	rt.load_file("app.src", |scope| {
		scope.define(ViewDecl::new(
			"App",
			"app",
			view_fn(|cx| {
				cx.update();
				Ok(RenderNode::Empty)
			}),
		))
	})
	.unwrap();
	rt.run();
	assert_eq!(rt.root().unwrap().render_count(), 2);
}

/// Must start over from a first load after a reset.
#[test]
fn test_reset_returns_to_first_load() {
	let mut rt = home_runtime();
	rt.reset();
	assert_eq!(rt.instance_count(), 0);
	assert!(rt.registry().names().is_empty());

	let phase = Arc::new(AtomicBool::new(false));
	let initial = Arc::clone(&phase);
	let report = rt
		.load_file("main.src", |scope| {
			initial.store(scope.phase() == LoadPhase::Initial, Ordering::SeqCst);
			scope.define(text("Main", "main", "fresh"))
		})
		.unwrap();
	assert!(phase.load(Ordering::SeqCst));
	assert_eq!(report.outcome, ReloadOutcome::FirstPass);
}

/// Must resolve relative specifiers against the executing file's folder.
#[test]
fn test_scope_resolves_relative_imports() {
	let mut rt = Runtime::new(RuntimeConfig::default());
	let resolved = Arc::new(parking_lot::Mutex::new(None));
	let sink = Arc::clone(&resolved);
	rt.load_file("app/views/home.src", |scope| {
		*sink.lock() = Some(scope.resolver().resolve("../shared/nav.src"));
		Ok(())
	})
	.unwrap();
	assert_eq!(
		resolved.lock().as_deref(),
		Some(std::path::Path::new("app/shared/nav.src"))
	);
}
