//! EditorConfig parser: INI-shaped with glob section headers.

use super::CustomParser;
use super::ini::parse_ini_shaped;
use crate::tree::ParseTree;

pub struct EditorconfigParser;

impl CustomParser for EditorconfigParser {
    fn language_id(&self) -> &'static str {
        "editorconfig"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        parse_ini_shaped(bytes)
    }
}
