use crate::lex::Lexer;
use crate::preprocess::preprocess;
use crate::transform::transform;

use miette::{IntoDiagnostic, Result, WrapErr};

use std::fs;
use std::path::{Path, PathBuf};

// The converted source leans on a handful of macros the source assembler
// had built in; every run names their files in .INCLUDE lines up front.
pub const DEFAULT_INCLUDES: &[&str] = &["macros.inc"];

pub fn convert_source(source: &str, includes: &[&str]) -> String {
    let lexed = Lexer::new(source).lex();
    let mut arena = lexed.arena;
    preprocess(&mut arena, &lexed.tokens);
    let output = transform(&mut arena, &lexed.tokens, lexed.newline);

    let mut text = String::new();
    for include in includes {
        text.push_str(&format!(".INCLUDE \"{include}\"{}", lexed.newline));
    }
    text.push_str(&arena.render(&output));
    text
}

// Where the output lands when the caller does not say: next to the source,
// with a cvt.asm extension.
pub fn output_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("cvt.asm")
}

pub fn convert_file(source_path: &Path, output_path: &Path, includes: &[&str]) -> Result<()> {
    let source = fs::read_to_string(source_path)
        .into_diagnostic()
        .wrap_err_with(|| format!("unable to read source from {}", source_path.display()))?;

    let converted = convert_source(&source, includes);
    tracing::info!(
        source = %source_path.display(),
        output = %output_path.display(),
        read = source.len(),
        wrote = converted.len(),
        "conversion finished"
    );

    fs::write(output_path, converted)
        .into_diagnostic()
        .wrap_err_with(|| format!("unable to write output to {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_converted_text_passes_through_untouched() {
        let source = "; boot shim\nSTART:  LDA #$10\n        STA $0200\n        BNE START\nDONE:   RTS\n";
        assert_eq!(
            convert_source(source, &["macros.inc"]),
            format!(".INCLUDE \"macros.inc\"\n{source}"),
        );
    }

    #[test]
    fn every_include_gets_its_own_prelude_line() {
        assert_eq!(
            convert_source("NOP\n", &["a.inc", "b.inc"]),
            ".INCLUDE \"a.inc\"\n.INCLUDE \"b.inc\"\nNOP\n",
        );
    }

    #[test]
    fn the_prelude_follows_the_source_line_terminators() {
        assert_eq!(
            convert_source("NOP\r\n", &["macros.inc"]),
            ".INCLUDE \"macros.inc\"\r\nNOP\r\n",
        );
    }

    #[test]
    fn numerals_convert_under_the_radix_in_force_where_they_sit() {
        assert_eq!(
            convert_source("RADIX 16\nX 20\nRADIX 8\nX 20\n", &[]),
            ";RADIX 16\nX $20\n;RADIX 8\nX $10\n",
        );
    }

    #[test]
    fn the_default_output_path_swaps_the_extension() {
        assert_eq!(
            output_path(Path::new("tapes/widget.mac")),
            PathBuf::from("tapes/widget.cvt.asm"),
        );
    }
}
