use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn kodex_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("kodex"));
	cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
	cmd
}

/// Write a JSON document set into `dir` and return its path.
pub fn write_documents(dir: &Path, name: &str, json: &str) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, json).unwrap_or_else(|e| panic!("write {name}: {e}"));
	path
}

pub const HELLO_WORLD: &str = r#"[
	{ "path": "helloWorld3", "content": "@include [helloWorld2]" },
	{ "path": "helloWorld2", "content": "@include [helloWorld]" },
	{ "path": "helloWorld", "content": "Hello World!" }
]"#;
