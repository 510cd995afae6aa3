//! Filepath: src/classify.rs
//! File classification: language, parser kind, and binary-ness from the
//! path plus a bounded content sniff.
//!
//! Stage order (earlier stages dominate):
//!   1. exact filename table
//!   2. extension table
//!   3. shebang / BOM / magic bytes
//!   4. content heuristics (XML prolog, TOML table headers, ...)
//!   5. plaintext fallback
//! Within a stage the first match in the table wins, so classification is
//! deterministic across runs and threads.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use memchr::memchr;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseErrorKind;

/// How many sniffed bytes participate in content checks.
pub const SNIFF_LIMIT: usize = 64 * 1024;

/// Which backend family serves a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind
{
    /// Grammar-backed concrete syntax tree parser
    Ast,

    /// Hand-written format parser
    Custom,

    /// Nothing can parse this unit (e.g. binary data)
    None,
}

/// Broad role of the file in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind
{
    Code,
    Doc,
    Config,
    Data,
    Binary,
}

/// Classification output: derived purely from path + sniffed prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification
{
    pub language_id: String,

    pub parser_kind: ParserKind,

    pub file_kind: FileKind,

    /// 1.0 exact filename, 0.9 extension, 0.85 shebang,
    /// 0.6 content heuristic, 0.0 plaintext fallback
    pub confidence: f32,

    /// Languages to try, in order, when the preferred backend is missing
    pub fallbacks: Vec<String>,
}

impl Classification
{
    /// Normal outcome for unparseable binary data.
    #[must_use]
    pub fn binary(confidence: f32) -> Self
    {
        Self {
            language_id: "binary".to_string(),
            parser_kind: ParserKind::None,
            file_kind: FileKind::Binary,
            confidence,
            fallbacks: Vec::new(),
        }
    }

    /// Rough resident size for cache accounting.
    #[must_use]
    pub fn approximate_size_bytes(&self) -> usize
    {
        std::mem::size_of::<Self>()
            + self
                .language_id
                .len()
            + self
                .fallbacks
                .iter()
                .map(String::len)
                .sum::<usize>()
    }
}

/// Closed alias table; identifiers are lower-cased before lookup.
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("node", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("py", "python"),
    ("python2", "python"),
    ("python3", "python"),
    ("rs", "rust"),
    ("yml", "yaml"),
    ("c++", "cpp"),
    ("cplusplus", "cpp"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("md", "markdown"),
    ("htm", "html"),
    ("dotenv", "env"),
    ("text", "plaintext"),
    ("txt", "plaintext"),
];

/// Exact-filename table; checked before extensions.
const FILENAME_TABLE: &[(&str, &str)] = &[
    ("Dockerfile", "dockerfile"),
    ("dockerfile", "dockerfile"),
    ("Makefile", "make"),
    ("makefile", "make"),
    ("CMakeLists.txt", "cmake"),
    ("BUILD", "starlark"),
    (".gitignore", "gitignore"),
    (".gitattributes", "gitignore"),
    (".editorconfig", "editorconfig"),
    (".env", "env"),
    ("requirements.txt", "requirements"),
];

const EXTENSION_TABLE: &[(&str, &str)] = &[
    // Programming languages
    ("py", "python"),
    ("pyi", "python"),
    ("rs", "rust"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("cs", "csharp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("lua", "lua"),
    ("r", "r"),
    ("pl", "perl"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("ps1", "powershell"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("erl", "erlang"),
    ("hs", "haskell"),
    ("ml", "ocaml"),
    ("nim", "nim"),
    ("zig", "zig"),
    ("jl", "julia"),
    ("dart", "dart"),
    // Web formats
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("xml", "xml"),
    ("svg", "xml"),
    ("json", "json"),
    ("graphql", "graphql"),
    ("gql", "graphql"),
    // Config formats
    ("yml", "yaml"),
    ("yaml", "yaml"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("cfg", "ini"),
    ("conf", "ini"),
    ("env", "env"),
    ("editorconfig", "editorconfig"),
    // Documentation formats
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("rst", "rst"),
    ("adoc", "asciidoc"),
    ("asciidoc", "asciidoc"),
    ("txt", "plaintext"),
    // Other text formats
    ("sql", "sql"),
    ("proto", "proto"),
    ("cmake", "cmake"),
    ("mk", "make"),
];

const SHEBANG_TABLE: &[(&str, &str)] = &[
    ("python", "python"),
    ("python2", "python"),
    ("python3", "python"),
    ("node", "javascript"),
    ("nodejs", "javascript"),
    ("deno", "javascript"),
    ("bash", "shell"),
    ("sh", "shell"),
    ("zsh", "shell"),
    ("ruby", "ruby"),
    ("perl", "perl"),
    ("php", "php"),
];

const BINARY_EXTENSIONS: &[&str] = &[
    "bin", "exe", "dll", "so", "dylib", "o", "obj", "a", "class", "jar", "war", "zip", "tar",
    "gz", "bz2", "xz", "7z", "rar", "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "db", "sqlite", "pyc", "pyd", "pyo", "wasm",
    "ttf", "otf", "woff", "woff2", "mp3", "mp4", "avi", "mov",
];

/// Languages the original grammar roster covers; the runtime backend may
/// still lack a loaded grammar, which resolves through fallbacks.
const AST_LANGUAGES: &[&str] = &[
    "python",
    "rust",
    "javascript",
    "typescript",
    "go",
    "java",
    "c",
    "cpp",
    "csharp",
    "ruby",
    "php",
    "swift",
    "kotlin",
    "scala",
    "lua",
    "haskell",
    "ocaml",
    "elixir",
    "erlang",
    "zig",
    "julia",
    "dart",
    "css",
    "html",
    "shell",
    "sql",
];

/// Languages served by the hand-written format parsers.
const CUSTOM_LANGUAGES: &[&str] = &[
    "markdown",
    "rst",
    "asciidoc",
    "ini",
    "toml",
    "yaml",
    "json",
    "xml",
    "editorconfig",
    "env",
    "graphql",
    "plaintext",
];

const DOC_LANGUAGES: &[&str] = &["markdown", "rst", "asciidoc", "plaintext"];
const CONFIG_LANGUAGES: &[&str] =
    &["yaml", "toml", "ini", "env", "editorconfig", "gitignore", "requirements", "make", "cmake", "dockerfile"];
const DATA_LANGUAGES: &[&str] = &["json", "xml", "sql", "proto"];

/// Lower-case and resolve a language identifier through the alias table.
#[must_use]
pub fn normalize_language(id: &str) -> String
{
    let lower = id
        .trim()
        .to_ascii_lowercase();

    for (alias, canonical) in LANGUAGE_ALIASES
    {
        if lower == *alias
        {
            return (*canonical).to_string();
        }
    }

    lower
}

#[must_use]
pub fn is_ast_language(id: &str) -> bool
{
    AST_LANGUAGES.contains(&id)
}

#[must_use]
pub fn is_custom_language(id: &str) -> bool
{
    CUSTOM_LANGUAGES.contains(&id)
}

fn file_kind_of(language_id: &str) -> FileKind
{
    if DOC_LANGUAGES.contains(&language_id)
    {
        FileKind::Doc
    }
    else if CONFIG_LANGUAGES.contains(&language_id)
    {
        FileKind::Config
    }
    else if DATA_LANGUAGES.contains(&language_id)
    {
        FileKind::Data
    }
    else
    {
        FileKind::Code
    }
}

fn parser_kind_of(language_id: &str) -> ParserKind
{
    if is_ast_language(language_id)
    {
        ParserKind::Ast
    }
    else
    {
        // Custom parsers cover the rest; unknown text languages degrade
        // to the plaintext parser at resolution time.
        ParserKind::Custom
    }
}

fn fallbacks_of(language_id: &str) -> Vec<String>
{
    if language_id == "typescript"
    {
        return vec!["javascript".to_string()];
    }

    if DOC_LANGUAGES.contains(&language_id) && language_id != "plaintext"
    {
        return vec!["plaintext".to_string()];
    }

    if is_ast_language(language_id) && is_custom_language(language_id)
    {
        // Same-id custom parser backs up a missing grammar.
        return vec![language_id.to_string()];
    }

    if !is_ast_language(language_id) && !is_custom_language(language_id)
    {
        return vec!["plaintext".to_string()];
    }

    Vec::new()
}

fn shebang_regex() -> &'static Regex
{
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#!\s*(?:/usr/bin/env\s+)?(?:\S*/)?([A-Za-z0-9_.+-]+)").expect("shebang regex")
    })
}

/// Classify a file from its path and a sniffed prefix (≤ 64 KiB used).
#[must_use]
pub fn classify(
    path: &Path,
    prefix: &[u8],
) -> Classification
{
    classify_with_declared(path, prefix, None)
}

/// Classification honoring a caller-declared language, which wins over
/// every sniffing stage at full confidence.
#[must_use]
pub fn classify_with_declared(
    path: &Path,
    prefix: &[u8],
    declared: Option<&str>,
) -> Classification
{
    let prefix = &prefix[..prefix
        .len()
        .min(SNIFF_LIMIT)];

    if let Some(lang) = declared
    {
        let language_id = normalize_language(lang);
        return finish(language_id, 1.0);
    }

    // Binary detection runs first: a .png never reaches the tables.
    if let Some(confidence) = binary_confidence(path, prefix)
    {
        return Classification::binary(confidence);
    }

    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    // Stage 1: exact filename
    for (name, lang) in FILENAME_TABLE
    {
        if basename == *name
        {
            return finish(normalize_language(lang), 1.0);
        }
    }

    // Stage 2: extension
    if let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
    {
        let ext = ext.to_ascii_lowercase();
        for (table_ext, lang) in EXTENSION_TABLE
        {
            if ext == *table_ext
            {
                return finish(normalize_language(lang), 0.9);
            }
        }
    }

    // Stage 3: shebang
    if prefix.starts_with(b"#!")
        && let Ok(text) = std::str::from_utf8(&prefix[..prefix
            .len()
            .min(256)])
        && let Some(caps) = shebang_regex().captures(text)
    {
        let interp = caps[1].to_ascii_lowercase();
        for (name, lang) in SHEBANG_TABLE
        {
            if interp == *name
            {
                return finish(normalize_language(lang), 0.85);
            }
        }
    }

    // Stage 4: content heuristics
    if let Some(lang) = sniff_content(prefix)
    {
        return finish(normalize_language(lang), 0.6);
    }

    // Stage 5: plaintext fallback
    finish("plaintext".to_string(), 0.0)
}

/// Classification from a lazy reader: sample up to the sniff limit,
/// then classify. A sampling failure is the one way classification
/// itself can fail, surfaced as `Unreadable`.
pub fn classify_reader<R: Read>(
    path: &Path,
    reader: &mut R,
) -> Result<Classification, ParseErrorKind>
{
    let mut prefix = Vec::with_capacity(4_096);
    reader
        .take(SNIFF_LIMIT as u64)
        .read_to_end(&mut prefix)
        .map_err(|_| ParseErrorKind::Unreadable)?;

    Ok(classify(path, &prefix))
}

fn finish(
    language_id: String,
    confidence: f32,
) -> Classification
{
    let parser_kind = parser_kind_of(&language_id);
    let file_kind = file_kind_of(&language_id);
    let fallbacks = fallbacks_of(&language_id);

    Classification {
        language_id,
        parser_kind,
        file_kind,
        confidence,
        fallbacks,
    }
}

/// Magic-prefix table for binary containers.
const BINARY_MAGIC: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xff\xd8\xff",       // JPEG
    b"GIF8",
    b"%PDF-",
    b"\x7fELF",
    b"PK\x03\x04",         // zip family
    b"\x1f\x8b",           // gzip
];

fn binary_confidence(
    path: &Path,
    prefix: &[u8],
) -> Option<f32>
{
    if let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
    {
        let ext = ext.to_ascii_lowercase();
        if BINARY_EXTENSIONS.contains(&ext.as_str())
        {
            return Some(1.0);
        }
    }

    if BINARY_MAGIC
        .iter()
        .any(|magic| prefix.starts_with(magic))
    {
        return Some(1.0);
    }

    if prefix.is_empty()
    {
        return None;
    }

    if memchr(0, prefix).is_some()
    {
        return Some(0.9);
    }

    // Histogram check: more than 30% non-printable bytes reads as binary.
    let sample = &prefix[..prefix
        .len()
        .min(4096)];
    let non_printable = sample
        .iter()
        .filter(|&&b| b < 0x09 || (b > 0x0d && b < 0x20) || b == 0x7f)
        .count();

    if non_printable * 10
        > sample.len()
            * 3
    {
        return Some(0.6);
    }

    None
}

fn sniff_content(prefix: &[u8]) -> Option<&'static str>
{
    let text = std::str::from_utf8(
        &prefix[..prefix
            .len()
            .min(1024)],
    )
    .ok()?;
    let trimmed = text.trim_start_matches('\u{feff}');

    let first_line = trimmed
        .lines()
        .next()
        .unwrap_or_default()
        .trim();

    if first_line.starts_with("<?xml")
    {
        return Some("xml");
    }

    if first_line.starts_with("<!DOCTYPE html") || trimmed
        .to_ascii_lowercase()
        .contains("<html")
    {
        return Some("html");
    }

    if first_line == "---"
    {
        return Some("yaml");
    }

    // TOML table header: a lone [section] line (INI uses the same shape;
    // TOML wins the tie by table order here).
    if first_line.starts_with('[')
        && first_line.ends_with(']')
        && !first_line.contains(' ')
    {
        return Some("toml");
    }

    if (first_line.starts_with('{') || first_line.starts_with('['))
        && trimmed
            .trim_end()
            .ends_with(['}', ']'])
    {
        return Some("json");
    }

    None
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn exact_filenames_dominate_extensions()
    {
        // CMakeLists.txt must not classify as plaintext via ".txt".
        let c = classify(Path::new("CMakeLists.txt"), b"project(demo)\n");
        assert_eq!(c.language_id, "cmake");
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.file_kind, FileKind::Config);
    }

    #[test]
    fn extension_matrix()
    {
        assert_eq!(classify(Path::new("a.rs"), b"fn main() {}").language_id, "rust");
        assert_eq!(classify(Path::new("b.py"), b"x = 1").language_id, "python");
        assert_eq!(classify(Path::new("c.tsx"), b"x").language_id, "typescript");
        assert_eq!(classify(Path::new("d.yml"), b"a: 1").language_id, "yaml");
        assert_eq!(classify(Path::new("e.md"), b"# t").language_id, "markdown");
    }

    #[test]
    fn typescript_falls_back_to_javascript()
    {
        let c = classify(Path::new("web.ts"), b"const x = 1;");
        assert_eq!(c.language_id, "typescript");
        assert_eq!(c.parser_kind, ParserKind::Ast);
        assert_eq!(c.fallbacks, vec!["javascript".to_string()]);
    }

    #[test]
    fn doc_formats_fall_back_to_plaintext()
    {
        let c = classify(Path::new("README.md"), b"# Title\n");
        assert_eq!(c.fallbacks, vec!["plaintext".to_string()]);
        assert_eq!(c.file_kind, FileKind::Doc);
    }

    #[test]
    fn png_magic_is_binary()
    {
        let c = classify(Path::new("img.png"), b"\x89PNG\r\n\x1a\nrest");
        assert_eq!(c.parser_kind, ParserKind::None);
        assert_eq!(c.file_kind, FileKind::Binary);
    }

    #[test]
    fn null_bytes_read_as_binary_without_extension()
    {
        let c = classify(Path::new("blob"), b"abc\0def");
        assert_eq!(c.file_kind, FileKind::Binary);
    }

    #[test]
    fn shebang_detection()
    {
        let c = classify(Path::new("script"), b"#!/usr/bin/env python3\nprint(1)\n");
        assert_eq!(c.language_id, "python");
        assert_eq!(c.confidence, 0.85);
    }

    #[test]
    fn xml_prolog_heuristic()
    {
        let c = classify(Path::new("feed"), b"<?xml version=\"1.0\"?><rss/>");
        assert_eq!(c.language_id, "xml");
        assert_eq!(c.confidence, 0.6);
    }

    #[test]
    fn unknown_text_degrades_to_plaintext()
    {
        let c = classify(Path::new("notes"), b"just some words\n");
        assert_eq!(c.language_id, "plaintext");
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.parser_kind, ParserKind::Custom);
    }

    #[test]
    fn classification_is_deterministic()
    {
        let a = classify(Path::new("x.py"), b"def f(): pass");
        let b = classify(Path::new("x.py"), b"def f(): pass");
        assert_eq!(a, b);
    }

    #[test]
    fn aliases_normalize()
    {
        assert_eq!(normalize_language("JS"), "javascript");
        assert_eq!(normalize_language("yml"), "yaml");
        assert_eq!(normalize_language("C++"), "cpp");
        assert_eq!(normalize_language("rust"), "rust");
    }

    #[test]
    fn declared_language_wins()
    {
        let c = classify_with_declared(Path::new("weird.bin2"), b"def f(): pass", Some("python"));
        assert_eq!(c.language_id, "python");
        assert_eq!(c.confidence, 1.0);
    }

    struct FailingReader;

    impl Read for FailingReader
    {
        fn read(
            &mut self,
            _buf: &mut [u8],
        ) -> std::io::Result<usize>
        {
            Err(std::io::Error::other("device gone"))
        }
    }

    #[test]
    fn unsampleable_reader_is_unreadable()
    {
        let err = classify_reader(Path::new("a.py"), &mut FailingReader).unwrap_err();
        assert_eq!(err, ParseErrorKind::Unreadable);
    }

    #[test]
    fn reader_classification_matches_byte_classification()
    {
        let bytes = b"#!/usr/bin/env python3\nprint(1)\n";
        let mut cursor = std::io::Cursor::new(bytes.as_slice());
        let from_reader = classify_reader(Path::new("script"), &mut cursor).unwrap();
        assert_eq!(from_reader, classify(Path::new("script"), bytes));
    }
}
