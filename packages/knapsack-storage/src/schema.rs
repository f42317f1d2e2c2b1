pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_needs.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_needs.sql")),
				"tables/002_resources.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_resources.sql")),
				"tables/003_match_runs.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_match_runs.sql")),
				"tables/004_match_candidates.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_match_candidates.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
