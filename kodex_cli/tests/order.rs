mod common;

use kodex_core::AnyEmptyResult;

#[test]
fn order_lists_include_targets_first() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = common::write_documents(tmp.path(), "docs.json", common::HELLO_WORLD);

	common::kodex_cmd()
		.arg("order")
		.arg(&input)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("helloWorld\nhelloWorld2\nhelloWorld3\n");

	Ok(())
}

#[test]
fn order_keeps_input_order_for_cycles() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = common::write_documents(
		tmp.path(),
		"docs.json",
		r#"[
			{ "path": "B", "content": "@include [A]" },
			{ "path": "A", "content": "@include [B]" }
		]"#,
	);

	common::kodex_cmd()
		.arg("order")
		.arg(&input)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("B\nA\n");

	Ok(())
}

#[test]
fn order_skips_filtered_documents() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = common::write_documents(tmp.path(), "docs.json", common::HELLO_WORLD);
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(
		tmp.path().join(".config/kodex.toml"),
		"[filter]\ninclude = [\"helloWorld2\", \"helloWorld3\"]\n",
	)?;

	common::kodex_cmd()
		.arg("order")
		.arg(&input)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("helloWorld2\nhelloWorld3\n");

	Ok(())
}
