//! Externalizes dialogue strings into a translation table.
//!
//! When a program opens with a `#{ "lang", ... }` block, every string literal
//! a dialogue references gets a generated key `<prefix><row>`. The constant
//! table entry is swapped for that key, so the bytecode carries keys and the
//! sidecar CSV carries the source text.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Serialize;

use super::ast::*;
use super::lexer::{Token, TokenKind};
use super::tables::ConstantTable;

/// Placeholder written for every language after the first.
pub const UNTRANSLATED: &str = "TODO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRow {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationTable {
    /// Sorted and de-duplicated.
    pub languages: Vec<String>,
    pub rows: Vec<TranslationRow>,
}

impl TranslationTable {
    /// Build the table for `program` and replace each referenced string in
    /// `constants` with its key.
    pub fn externalize(
        program: &Program,
        languages: &[Token],
        constants: &mut ConstantTable,
        prefix: &str,
    ) -> Self {
        let languages: BTreeSet<String> = languages
            .iter()
            .filter_map(|tok| constants.get(tok.value))
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect();

        let mut referenced = IndexSet::new();
        for dialogue in &program.dialogues {
            collect_dialogue(dialogue, &mut referenced);
        }

        let mut rows = Vec::with_capacity(referenced.len());
        for (row, id) in referenced.into_iter().enumerate() {
            let Some(text) = constants
                .get(id)
                .map(|b| String::from_utf8_lossy(b).into_owned())
            else {
                continue;
            };
            let key = format!("{prefix}{row}");
            constants.replace(id, &key);
            rows.push(TranslationRow { key, text });
        }

        Self {
            languages: languages.into_iter().collect(),
            rows,
        }
    }

    /// Tab-separated text: a `keys` header row, then one row per string.
    /// Tabs, line breaks and backslashes inside a cell are written as `\t`,
    /// `\n`, `\r` and `\\` so every row keeps its column count.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("keys");
        for lang in &self.languages {
            out.push('\t');
            push_cell(&mut out, lang);
        }
        out.push('\n');

        let placeholders = self.languages.len().saturating_sub(1);
        for row in &self.rows {
            out.push_str(&row.key);
            out.push('\t');
            push_cell(&mut out, &row.text);
            for _ in 0..placeholders {
                out.push('\t');
                out.push_str(UNTRANSLATED);
            }
            out.push('\n');
        }
        out
    }

    /// Write `<dir>/<prefix>.csv`, returning the path written.
    pub fn write_sidecar(&self, dir: &Path, prefix: &str) -> io::Result<PathBuf> {
        let path = dir.join(format!("{prefix}.csv"));
        std::fs::write(&path, self.to_csv())?;
        Ok(path)
    }
}

fn push_cell(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
}

// ── String collection (source order) ─────────────────────────────

fn collect_dialogue(dialogue: &Dialogue, out: &mut IndexSet<i32>) {
    if let Some(condition) = &dialogue.condition {
        collect_expr(condition, out);
    }
    collect_content(&dialogue.content, out);
}

fn collect_content(content: &[Command], out: &mut IndexSet<i32>) {
    for command in content {
        collect_command(command, out);
    }
}

fn collect_command(command: &Command, out: &mut IndexSet<i32>) {
    match command {
        Command::Animate { animation, .. } => collect_expr(animation, out),
        Command::Sound { effect } => collect_expr(effect, out),
        Command::Delay { time } => collect_expr(time, out),
        Command::Move { x, y, time, .. } => {
            collect_expr(x, out);
            collect_expr(y, out);
            collect_expr(time, out);
        }
        Command::Goto { .. } | Command::Use { .. } => {}
        Command::If(node) => collect_if(node, out),
        Command::Select { options } => {
            for option in options {
                out.insert(option.hint.value);
                match &option.body {
                    OptionBody::Command(command) => collect_command(command, out),
                    OptionBody::Block(content) => collect_content(content, out),
                }
            }
        }
        Command::Assign { expression, .. } => collect_expr(expression, out),
        Command::Message(message) => collect_message(message, out),
        Command::Speak(speak) => match &speak.body {
            SpeakBody::Message(message) => collect_message(message, out),
            SpeakBody::Block(content) => collect_content(content, out),
        },
        Command::Publish { params, .. } => {
            for param in params {
                collect_expr(param, out);
            }
        }
    }
}

fn collect_if(node: &If, out: &mut IndexSet<i32>) {
    collect_expr(&node.condition, out);
    collect_content(&node.true_block, out);
    match &node.otherwise {
        Some(Else::If(chained)) => collect_if(chained, out),
        Some(Else::Block(content)) => collect_content(content, out),
        None => {}
    }
}

fn collect_message(message: &Message, out: &mut IndexSet<i32>) {
    out.insert(message.text.value);
    if let Some(time) = &message.time {
        collect_expr(time, out);
    }
}

fn collect_expr(expr: &Expr, out: &mut IndexSet<i32>) {
    match &expr.kind {
        ExprKind::Leaf(tok) => {
            if tok.is(TokenKind::String) {
                out.insert(tok.value);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            collect_expr(left, out);
            collect_expr(right, out);
        }
        ExprKind::Unary { operand, .. } => collect_expr(operand, out),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::parser::Parser;
    use crate::dsl::tables::CompilationContext;

    fn externalize(src: &str, prefix: &str) -> (TranslationTable, CompilationContext) {
        let mut ctx = CompilationContext::new();
        let program = Parser::new(src.as_bytes(), &mut ctx).generate_ast().unwrap();
        let langs = program.i18n.clone().unwrap();
        let table = TranslationTable::externalize(&program, &langs, &mut ctx.constants, prefix);
        (table, ctx)
    }

    #[test]
    fn hello_scenario() {
        let (table, ctx) = externalize(r#"#{"en_GB", "zh_CN"} dialogue test {"Hello!"}"#, "p");
        assert_eq!(table.languages, vec!["en_GB", "zh_CN"]);
        assert_eq!(
            table.rows,
            vec![TranslationRow {
                key: "p0".into(),
                text: "Hello!".into()
            }]
        );
        assert_eq!(table.to_csv(), "keys\ten_GB\tzh_CN\np0\tHello!\tTODO\n");
        assert_eq!(ctx.constants.find("p0"), Some(2));
        assert_eq!(ctx.constants.find("Hello!"), None);
        // Language names stay untouched.
        assert_eq!(ctx.constants.get_str(0), Some("en_GB"));
    }

    #[test]
    fn languages_are_sorted_and_unique() {
        let (table, _) = externalize(r#"#{"zh_CN", "en_GB", "zh_CN"}"#, "k");
        assert_eq!(table.languages, vec!["en_GB", "zh_CN"]);
        assert!(table.rows.is_empty());
        assert_eq!(table.to_csv(), "keys\ten_GB\tzh_CN\n");
    }

    #[test]
    fn rows_follow_first_reference_and_dedupe() {
        let src = r#"#{"en"}
dialogue a { select { "Yes": "ok", "No": { [bob]: "ok" in 1 } } }
dialogue b when ($mood == "sad") { "ok" $x = "late" }"#;
        let (table, ctx) = externalize(src, "s_");
        let texts: Vec<_> = table.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Yes", "ok", "No", "sad", "late"]);
        let keys: Vec<_> = table.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["s_0", "s_1", "s_2", "s_3", "s_4"]);
        assert_eq!(ctx.constants.find("ok"), None);
        // A single language gets no placeholder columns.
        assert!(table.to_csv().contains("s_1\tok\n"));
    }

    #[test]
    fn control_characters_are_escaped_in_cells() {
        let (table, _) = externalize(
            r#"#{"en", "fr"} dialogue t { "a\tb" "line\nbreak" "back\\slash" }"#,
            "k",
        );
        assert_eq!(table.rows[0].text, "a\tb");
        let csv = table.to_csv();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "keys\ten\tfr",
                "k0\ta\\tb\tTODO",
                "k1\tline\\nbreak\tTODO",
                "k2\tback\\\\slash\tTODO",
            ]
        );
        assert!(lines.iter().all(|l| l.split('\t').count() == 3));
    }

    #[test]
    fn sidecar_lands_in_directory() {
        let (table, _) = externalize(r#"#{"en_GB", "zh_CN"} dialogue t {"Hi"}"#, "i18n_unit");
        let dir = std::env::temp_dir();
        let path = table.write_sidecar(&dir, "i18n_unit").unwrap();
        assert_eq!(path, dir.join("i18n_unit.csv"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("keys\ten_GB\tzh_CN\n"));
        std::fs::remove_file(path).unwrap();
    }
}
