use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use serde_json::json;
use stasis_primitives::{RenderNode, ViewName};

use super::Runtime;
use crate::{InstanceFlags, RuntimeConfig, UpdateDecision, ViewDecl, ViewError, view_fn};

fn text(name: &str, source: &str, body: &'static str) -> ViewDecl {
	ViewDecl::new(name, source, view_fn(move |_| Ok(RenderNode::text(body))))
}

fn parent(name: &str, source: &str, children: &'static [&'static str]) -> ViewDecl {
	ViewDecl::new(
		name,
		source,
		view_fn(move |_| {
			Ok(RenderNode::element("div")
				.children(children.iter().map(|child| RenderNode::from(RenderNode::view(*child))))
				.into())
		}),
	)
}

fn loaded(main: ViewDecl, others: Vec<ViewDecl>) -> Runtime {
	let mut rt = Runtime::new(RuntimeConfig::default());
	rt.load_file("main.src", |scope| scope.define(main)).unwrap();
	rt.load_file("views.src", |scope| {
		for decl in others {
			scope.define(decl)?;
		}
		Ok(())
	})
	.unwrap();
	rt.run();
	rt
}

/// Verifies that repeated siblings get ordinal indices and distinct paths.
#[test]
fn test_repeated_siblings_get_ordinals() {
	let rt = loaded(parent("Main", "m", &["Row", "Row", "Row"]), vec![text("Row", "r", "row")]);
	let rows = rt.mounted(&ViewName::new("Row"));
	let keys: Vec<_> = rows.iter().map(|row| row.key().as_str().rsplit(',').next().unwrap().to_string()).collect();
	assert_eq!(keys, vec!["Row-00/00", "Row-00/01", "Row-00/02"]);

	let mut paths: Vec<_> = rows.iter().map(|row| row.path().clone()).collect();
	paths.dedup();
	assert_eq!(paths.len(), 3);
}

/// Verifies that explicit duplicate indices are suffixed instead of sharing
/// a path.
#[test]
fn test_explicit_duplicate_index_is_suffixed() {
	let main = ViewDecl::new(
		"Main",
		"m",
		view_fn(|_| {
			Ok(RenderNode::fragment([
				RenderNode::view("Row").index("07").into(),
				RenderNode::view("Row").index("07").into(),
			]))
		}),
	);
	let rt = loaded(main, vec![text("Row", "r", "row")]);
	let rows = rt.mounted(&ViewName::new("Row"));
	assert_eq!(rows.len(), 2);
	assert!(rows[1].key().as_str().ends_with("Row-00/07_1"));
}

/// Verifies that a child the parent stops rendering is unmounted with its
/// subtree and dropped from tracking.
#[test]
fn test_dropped_child_unmounts_subtree() {
	let show = Arc::new(AtomicUsize::new(1));
	let flag = Arc::clone(&show);
	let main = ViewDecl::new(
		"Main",
		"m",
		view_fn(move |_| {
			let mut root = RenderNode::element("main");
			if flag.load(Ordering::Relaxed) == 1 {
				root = root.child(RenderNode::view("Panel"));
			}
			Ok(root.into())
		}),
	);
	let mut rt = loaded(main, vec![parent("Panel", "p", &["Row"]), text("Row", "r", "row")]);
	assert_eq!(rt.instance_count(), 3);

	show.store(0, Ordering::Relaxed);
	let root = rt.root().unwrap().id();
	rt.request_update(root, false).unwrap();

	assert_eq!(rt.instance_count(), 1);
	assert!(rt.mounted(&ViewName::new("Panel")).is_empty());
	assert!(rt.mounted(&ViewName::new("Row")).is_empty());
	assert!(rt.root().unwrap().children().is_empty());
}

/// Verifies that a body asking for more updates on every render stops after
/// the configured number of follow-ups.
#[test]
fn test_update_storm_is_capped() {
	let mut config = RuntimeConfig::default();
	config.max_chained_updates = 3;
	let mut rt = Runtime::new(config);
	rt.load_file("main.src", |scope| {
		scope.define(ViewDecl::new(
			"Main",
			"storm",
			view_fn(|cx| {
				cx.update();
				Ok(RenderNode::Empty)
			}),
		))
	})
	.unwrap();
	rt.run();

	let root = rt.root().unwrap();
	assert_eq!(root.render_count(), 4);
	assert_eq!(root.forced_updates(), 3);
	assert!(!root.has_pending_update());
	assert!(root.flags().contains(InstanceFlags::MOUNTED));
}

/// Verifies that paused instances ignore soft updates and parent renders
/// but still honor forced updates.
#[test]
fn test_paused_child_only_takes_forced_updates() {
	let mut rt = loaded(parent("Main", "m", &["Clock"]), vec![text("Clock", "c", "12:00")]);
	let clock = rt.mounted(&ViewName::new("Clock"))[0].id();
	rt.pause(clock).unwrap();

	let root = rt.root().unwrap().id();
	rt.request_update(root, false).unwrap();
	assert_eq!(rt.instance(clock).unwrap().render_count(), 1);

	assert_eq!(rt.request_update(clock, true).unwrap(), UpdateDecision::Dropped);
	assert_eq!(rt.request_update(clock, false).unwrap(), UpdateDecision::Run { forced: true });
	assert_eq!(rt.instance(clock).unwrap().render_count(), 2);
	assert_eq!(rt.metrics().dropped_count(), 1);

	rt.resume(clock).unwrap();
	assert_eq!(rt.request_update(clock, true).unwrap(), UpdateDecision::Run { forced: false });
}

/// Verifies that setup state survives a definition swap while setup itself
/// re-runs.
#[test]
fn test_setup_reruns_after_swap_and_keeps_state() {
	let setups = Arc::new(AtomicUsize::new(0));
	let make = |source: &str, setups: Arc<AtomicUsize>| {
		ViewDecl::new(
			"Main",
			source,
			view_fn(|cx| Ok(RenderNode::text(cx.state()["count"].to_string()))).with_setup(move |cx| {
				setups.fetch_add(1, Ordering::Relaxed);
				cx.init_state("count", 0);
				Ok(())
			}),
		)
	};
	let mut rt = Runtime::new(RuntimeConfig::default());
	let first = make("v1", Arc::clone(&setups));
	rt.load_file("main.src", |scope| scope.define(first)).unwrap();
	rt.run();
	let root = rt.root().unwrap().id();
	rt.set_state(root, "count", 5).unwrap();

	let second = make("v2", Arc::clone(&setups));
	rt.load_file("main.src", |scope| scope.define(second)).unwrap();

	assert_eq!(setups.load(Ordering::Relaxed), 2);
	assert_eq!(rt.instance(root).unwrap().state()["count"], json!(5));
	assert_eq!(rt.tree().to_markup_stripped(), "<main class=\"ViewMain\">5</main>");
}

/// Verifies that a failing setup shows the fallback and recovers once a
/// fixed definition arrives.
#[test]
fn test_setup_failure_recovers_on_fix() {
	let mut rt = Runtime::new(RuntimeConfig::default());
	rt.load_file("main.src", |scope| {
		scope.define(ViewDecl::new(
			"Main",
			"broken",
			view_fn(|_| Ok(RenderNode::text("never"))).with_setup(|_| Err(ViewError::msg("no config"))),
		))
	})
	.unwrap();
	rt.run();

	let root = rt.root().unwrap();
	assert!(root.is_recovering());
	assert_eq!(rt.caught_errors(), 1);
	assert!(rt.tree().to_markup().contains("Error in view Main"));

	rt.load_file("main.src", |scope| scope.define(text("Main", "fixed", "ok"))).unwrap();
	let root = rt.root().unwrap();
	assert!(!root.is_recovering());
	assert_eq!(rt.tree().to_markup_stripped(), "<main class=\"ViewMain\">ok</main>");
}

/// Verifies that the subtree walk lists parents before their children.
#[test]
fn test_subtree_is_preorder() {
	let rt = loaded(
		parent("Main", "m", &["Panel", "Row"]),
		vec![parent("Panel", "p", &["Row"]), text("Row", "r", "row")],
	);
	let root = rt.root().unwrap().id();
	let names: Vec<_> = rt.subtree(root).iter().map(|inst| inst.name().to_string()).collect();
	assert_eq!(names, vec!["Main", "Panel", "Row", "Row"]);
}
