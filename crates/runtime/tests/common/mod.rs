#![allow(dead_code)]

use stasis_runtime::{
	ReloadReport, RenderNode, Result, Runtime, RuntimeConfig, ViewDecl, ViewError, ViewName, view_fn,
};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// View rendering fixed text.
pub fn text(name: &str, source: &str, body: &'static str) -> ViewDecl {
	ViewDecl::new(name, source, view_fn(move |_| Ok(RenderNode::text(body))))
}

/// View rendering `<div>` around calls to `children`.
pub fn layout(name: &str, source: &str, children: &'static [&'static str]) -> ViewDecl {
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

/// View whose render always fails.
pub fn broken(name: &str, source: &str) -> ViewDecl {
	ViewDecl::new(name, source, view_fn(|_| Err(ViewError::msg("boom"))))
}

/// Loads `decls` as the contents of `file`.
pub fn load(rt: &mut Runtime, file: &str, decls: Vec<ViewDecl>) -> Result<ReloadReport> {
	rt.load_file(file, |scope| {
		for decl in decls {
			scope.define(decl)?;
		}
		Ok(())
	})
}

/// `Main` in `main.src` rendering `Sidebar` and `Footer` from `home.src`.
pub fn home_runtime() -> Runtime {
	init_tracing();
	let mut rt = Runtime::new(RuntimeConfig::default());
	load(&mut rt, "main.src", vec![layout("Main", "main-v1", &["Sidebar", "Footer"])]).unwrap();
	load(
		&mut rt,
		"home.src",
		vec![text("Sidebar", "sidebar-v1", "nav"), text("Footer", "footer-v1", "bye")],
	)
	.unwrap();
	rt.run();
	rt
}

pub fn name(name: &str) -> ViewName {
	ViewName::new(name)
}
