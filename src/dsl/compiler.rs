use std::collections::HashMap;
use std::path::PathBuf;

use super::ast::FiringMode;
use super::error::CompileError;
use super::i18n::TranslationTable;
use super::parser::Parser;
use super::tables::{CompilationContext, InternTable};
use super::translator::{TranslatedDialogue, Translator};

/// Leading bytes of every compiled unit.
pub const MAGIC: [u8; 2] = [0xAE, 0x86];

const I18N_ENABLED: [u8; 2] = [0xFF, 0xFF];
const I18N_DISABLED: [u8; 2] = [0x00, 0x00];

/// Output groups in serialization order.
pub const GROUP_ORDER: [FiringMode; 4] = [
    FiringMode::Auto,
    FiringMode::Trigger,
    FiringMode::Interact,
    FiringMode::None,
];

fn group_index(mode: FiringMode) -> usize {
    GROUP_ORDER
        .iter()
        .position(|m| *m == mode)
        .unwrap_or(GROUP_ORDER.len() - 1)
}

/// A fully resolved compilation result, ready to serialize.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub i18n_enabled: bool,
    /// Present when the source opened with an i18n block.
    pub translations: Option<TranslationTable>,
    /// Dialogues per group in [`GROUP_ORDER`]. `JUMP`/`CALL` parameters are
    /// already absolute addresses.
    pub groups: [Vec<TranslatedDialogue>; 4],
    header: Vec<u8>,
    size: usize,
}

impl CompiledUnit {
    /// Exact number of bytes [`write`](Self::write) appends.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.reserve(self.size);
        out.extend_from_slice(&self.header);
        for group in &self.groups {
            put_len(out, group.len());
            for dialogue in group {
                put_len(out, dialogue.commands.len());
                for cmd in &dialogue.commands {
                    out.extend_from_slice(&cmd.command.code().to_be_bytes());
                    for param in &cmd.parameters {
                        out.extend_from_slice(&param.to_be_bytes());
                    }
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        self.write(&mut out);
        out
    }

    pub fn dialogues(&self) -> impl Iterator<Item = &TranslatedDialogue> {
        self.groups.iter().flatten()
    }
}

/// Where the i18n sidecar goes, if anywhere.
#[derive(Debug, Clone)]
enum Sidecar {
    Disabled,
    Directory(PathBuf),
}

/// Drives parsing, translation and serialization of one source at a time.
///
/// The interning tables are reset on every [`compile`](Self::compile), so one
/// compiler can be reused and separate compilers never share ids.
#[derive(Debug)]
pub struct Compiler {
    ctx: CompilationContext,
    translator: Translator,
    sidecar: Sidecar,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A compiler writing the i18n sidecar into the working directory.
    pub fn new() -> Self {
        Self {
            ctx: CompilationContext::new(),
            translator: Translator::new(),
            sidecar: Sidecar::Directory(PathBuf::from(".")),
        }
    }

    #[must_use]
    pub fn with_sidecar_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sidecar = Sidecar::Directory(dir.into());
        self
    }

    /// Keep the translation table on the unit only.
    #[must_use]
    pub fn without_sidecar(mut self) -> Self {
        self.sidecar = Sidecar::Disabled;
        self
    }

    pub fn context(&self) -> &CompilationContext {
        &self.ctx
    }

    pub fn compile(
        &mut self,
        source: &[u8],
        i18n_prefix: &str,
    ) -> Result<CompiledUnit, CompileError> {
        let program = Parser::new(source, &mut self.ctx).generate_ast()?;
        log::debug!(
            "parsed {} dialogue(s), {} symbol(s), {} constant(s)",
            program.dialogues.len(),
            self.ctx.symbols.len(),
            self.ctx.constants.len()
        );

        let translations = program.i18n.as_ref().map(|languages| {
            TranslationTable::externalize(&program, languages, &mut self.ctx.constants, i18n_prefix)
        });

        let mut groups: [Vec<TranslatedDialogue>; 4] = Default::default();
        let mut defined: HashMap<i32, u32> = HashMap::new();
        for dialogue in &program.dialogues {
            let translated = self.translator.translate_dialogue(dialogue)?;
            if defined.insert(translated.name, translated.line).is_some() {
                return Err(CompileError::DuplicateDialogue {
                    name: symbol_name(&self.ctx.symbols, translated.name),
                    line: translated.line,
                });
            }
            if let Some(group) = groups.get_mut(group_index(translated.mode)) {
                group.push(translated);
            }
        }

        let header = build_header(&self.ctx, translations.is_some());

        // Each dialogue's address is its first command, after the command count.
        let mut addresses: HashMap<i32, i32> = HashMap::new();
        let mut offset = header.len();
        for group in &groups {
            offset += 4;
            for dialogue in group {
                offset += 4;
                let address = i32::try_from(offset)
                    .map_err(|_| CompileError::internal("output exceeds the addressable size"))?;
                addresses.insert(dialogue.name, address);
                offset += dialogue.size as usize;
            }
        }

        resolve_targets(&mut groups, &addresses, &self.ctx.symbols)?;
        log::debug!("compiled unit is {offset} byte(s)");

        // Only a successful compilation leaves a sidecar behind.
        if let (Some(table), Sidecar::Directory(dir)) = (&translations, &self.sidecar) {
            match table.write_sidecar(dir, i18n_prefix) {
                Ok(path) => log::debug!(
                    "wrote {} translation row(s) to {}",
                    table.rows.len(),
                    path.display()
                ),
                Err(e) => {
                    log::warn!("could not write translation table for '{i18n_prefix}': {e}");
                }
            }
        }

        Ok(CompiledUnit {
            i18n_enabled: translations.is_some(),
            translations,
            groups,
            header,
            size: offset,
        })
    }
}

/// Rewrite every `JUMP`/`CALL` name id into the target's absolute address.
fn resolve_targets(
    groups: &mut [Vec<TranslatedDialogue>; 4],
    addresses: &HashMap<i32, i32>,
    symbols: &InternTable,
) -> Result<(), CompileError> {
    for cmd in groups
        .iter_mut()
        .flatten()
        .flat_map(|d| d.commands.iter_mut())
        .filter(|cmd| cmd.command.targets_dialogue())
    {
        let Some(param) = cmd.parameters.first_mut() else {
            return Err(CompileError::internal("jump without a target"));
        };
        let name = *param;
        *param = *addresses
            .get(&name)
            .ok_or_else(|| CompileError::UnresolvedDialogue {
                name: symbol_name(symbols, name),
            })?;
    }
    Ok(())
}

fn symbol_name(symbols: &InternTable, id: i32) -> String {
    symbols.get_str(id).unwrap_or("<unknown>").to_string()
}

fn build_header(ctx: &CompilationContext, i18n: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(if i18n { &I18N_ENABLED } else { &I18N_DISABLED });
    put_table(&mut out, &ctx.symbols);
    put_table(&mut out, &ctx.constants);
    out
}

/// Count, then `{index, byte length, bytes}` per entry.
fn put_table(out: &mut Vec<u8>, table: &InternTable) {
    put_len(out, table.len());
    for (index, text) in table.iter() {
        out.extend_from_slice(&index.to_be_bytes());
        put_len(out, text.len());
        out.extend_from_slice(text);
    }
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::translator::CommandType;

    fn compile_src(src: &str) -> CompiledUnit {
        Compiler::new()
            .without_sidecar()
            .compile(src.as_bytes(), "test")
            .unwrap()
    }

    fn word(bytes: &[u8], at: usize) -> i32 {
        i32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn two_empty_dialogues_header() {
        let unit = compile_src("dialogue test1{} dialogue test2{}");
        let bytes = unit.to_bytes();
        assert_eq!(bytes.len(), unit.size());
        assert_eq!(&bytes[0..4], &[0xAE, 0x86, 0x00, 0x00]);
        assert_eq!(word(&bytes, 4), 2);
        assert_eq!(word(&bytes, 8), 0);
        assert_eq!(word(&bytes, 12), 5);
        assert_eq!(&bytes[16..21], b"test1");
        assert_eq!(word(&bytes, 21), 1);
        assert_eq!(word(&bytes, 25), 5);
        assert_eq!(&bytes[29..34], b"test2");
        // No constants.
        assert_eq!(word(&bytes, 34), 0);
        // auto, trigger, interact empty; other holds both.
        assert_eq!(word(&bytes, 38), 0);
        assert_eq!(word(&bytes, 42), 0);
        assert_eq!(word(&bytes, 46), 0);
        assert_eq!(word(&bytes, 50), 2);
        assert_eq!(word(&bytes, 54), 2);
        assert_eq!(word(&bytes, 58), CommandType::StartDialogue.code());
        assert_eq!(word(&bytes, 62), CommandType::EndDialogue.code());
        assert_eq!(bytes.len(), 54 + 2 * 12);
    }

    #[test]
    fn single_message_constant() {
        let unit = compile_src(r#"dialogue test{"test"}"#);
        let bytes = unit.to_bytes();
        // symbols: count + {0, 4, "test"}
        assert_eq!(word(&bytes, 4), 1);
        let constants = 4 + 4 + 12;
        assert_eq!(word(&bytes, constants), 1);
        assert_eq!(word(&bytes, constants + 4), 0);
        assert_eq!(word(&bytes, constants + 8), 4);
        assert_eq!(&bytes[constants + 12..constants + 16], b"test");
        let groups = constants + 16;
        assert_eq!(word(&bytes, groups + 12), 1);
        assert_eq!(word(&bytes, groups + 16), 3);
        assert_eq!(word(&bytes, groups + 24), CommandType::Talk.code());
        assert_eq!(word(&bytes, groups + 28), 0);
    }

    #[test]
    fn i18n_flag_and_key_replacement() {
        let unit = compile_src(r#"#{"en_GB","zh_CN"} dialogue test {"Hello!"}"#);
        assert!(unit.i18n_enabled);
        let bytes = unit.to_bytes();
        assert_eq!(&bytes[2..4], &[0xFF, 0xFF]);
        let table = unit.translations.unwrap();
        assert_eq!(table.rows[0].key, "test0");
        // The third constant carries the key instead of the text.
        let needle = b"test0";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
        assert!(!bytes.windows(6).any(|w| w == b"Hello!"));
    }

    #[test]
    fn groups_follow_firing_mode_order() {
        let unit = compile_src(
            "dialogue other {} interact dialogue i {} trigger dialogue t {} auto dialogue a {}",
        );
        let names: Vec<Vec<i32>> = unit
            .groups
            .iter()
            .map(|g| g.iter().map(|d| d.name).collect())
            .collect();
        assert_eq!(names, vec![vec![3], vec![2], vec![1], vec![0]]);
        for (group, mode) in unit.groups.iter().zip(GROUP_ORDER) {
            assert!(group.iter().all(|d| d.mode == mode));
        }
    }

    #[test]
    fn goto_and_use_resolve_to_addresses() {
        let src = "dialogue start { goto finish use finish } auto dialogue finish {}";
        let unit = compile_src(src);
        let bytes = unit.to_bytes();
        // symbols "start"(5) "finish"(6), no constants.
        let header = 4 + 4 + (8 + 5) + (8 + 6) + 4;
        // auto group count, finish's command count, then its first command.
        let finish = header + 4 + 4;
        assert_eq!(word(&bytes, finish), CommandType::StartDialogue.code());
        let start = unit.groups[3][0].commands.clone();
        assert_eq!(start[1].parameters, vec![i32::try_from(finish).unwrap()]);
        assert_eq!(start[2].parameters, vec![i32::try_from(finish).unwrap()]);
    }

    #[test]
    fn guard_target_is_dialogue_end() {
        let unit = compile_src(r#"dialogue d when ($x > 1) { "hi" }"#);
        let d = &unit.groups[3][0];
        let jump = d
            .commands
            .iter()
            .find(|c| c.command == CommandType::ConditionalJump)
            .unwrap();
        assert_eq!(jump.parameters[2], i32::try_from(d.size).unwrap());
    }

    #[test]
    fn unresolved_target_is_error() {
        let err = Compiler::new()
            .without_sidecar()
            .compile(b"dialogue a { goto nowhere }", "x")
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnresolvedDialogue {
                name: "nowhere".into()
            }
        );
    }

    #[test]
    fn duplicate_dialogue_is_error() {
        let err = Compiler::new()
            .without_sidecar()
            .compile(b"dialogue a {}\ndialogue a {}", "x")
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicateDialogue {
                name: "a".into(),
                line: 2
            }
        );
    }

    #[test]
    fn literal_bytes_are_written_unchanged() {
        let unit = Compiler::new()
            .without_sidecar()
            .compile(b"dialogue t {\"\xE9\"}", "x")
            .unwrap();
        let bytes = unit.to_bytes();
        // symbols: count + {0, 1, "t"}
        let constants = 4 + 4 + 9;
        assert_eq!(word(&bytes, constants), 1);
        assert_eq!(word(&bytes, constants + 4), 0);
        assert_eq!(word(&bytes, constants + 8), 1);
        assert_eq!(bytes[constants + 12], 0xE9);
    }

    #[test]
    fn failed_compilation_writes_no_sidecar() {
        let dir = std::env::temp_dir().join("dialoguec_compiler_failed_sidecar");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let err = Compiler::new()
            .with_sidecar_dir(&dir)
            .compile(br#"#{"en"} dialogue a { "x" goto nowhere }"#, "failed")
            .unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedDialogue { .. }));
        assert!(!dir.join("failed.csv").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn recompiling_is_idempotent() {
        let src = r#"#{"en"} trigger dialogue a when (not $seen) { [bob]: "Hi" $seen = true goto b } dialogue b { select { "x": delay 1 } }"#;
        let mut compiler = Compiler::new().without_sidecar();
        let first = compiler.compile(src.as_bytes(), "k").unwrap().to_bytes();
        let second = compiler.compile(src.as_bytes(), "k").unwrap().to_bytes();
        assert_eq!(first, second);
        let fresh = Compiler::new()
            .without_sidecar()
            .compile(src.as_bytes(), "k")
            .unwrap()
            .to_bytes();
        assert_eq!(first, fresh);
    }

    #[test]
    fn write_appends_to_existing_buffer() {
        let unit = compile_src("dialogue a {}");
        let mut out = vec![1, 2, 3];
        unit.write(&mut out);
        assert_eq!(out.len(), 3 + unit.size());
        assert_eq!(&out[3..5], &MAGIC);
    }

    #[test]
    fn empty_source() {
        let unit = compile_src("");
        let bytes = unit.to_bytes();
        assert_eq!(bytes.len(), 4 + 4 + 4 + 16);
        assert!(unit.translations.is_none());
    }

    #[test]
    fn lex_error_aborts() {
        let err = Compiler::new()
            .without_sidecar()
            .compile(b"dialogue a { \"x\n\n", "x")
            .unwrap_err();
        assert_eq!(err, CompileError::UnexpectedEndOfString { line: 1 });
    }
}
