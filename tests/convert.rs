use ante::convert::{convert_file, output_path};

use std::fs;

#[test]
fn converts_a_representative_source_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("widget.mac");
    let source = concat!(
        "TITLE WIDGET\n",
        "RADIX 8\n",
        "; setup\n",
        "START:  LDAI 101\n",
        "        STA 377\n",
        "IFN FLAG,<XWD 1,2>\n",
        "DEFINE INIT(A,B) <LDA A>\n",
        "PRINTX DONE\n",
        "377\n",
    );
    fs::write(&source_path, source).expect("write source");

    let converted_path = output_path(&source_path);
    convert_file(&source_path, &converted_path, &["macros.inc"]).expect("conversion succeeds");

    assert_eq!(
        converted_path.file_name().and_then(|name| name.to_str()),
        Some("widget.cvt.asm"),
    );
    let output = fs::read_to_string(&converted_path).expect("read output");
    let expected = concat!(
        ".INCLUDE \"macros.inc\"\n",
        ";TITLE WIDGET\n",
        ";RADIX 8\n",
        "; setup\n",
        "START:  LDA # $41\n",
        "        STA $FF\n",
        ".IF FLAG <> 0\n",
        ".BYTE 1,2\n",
        ".ENDIF\n",
        ".MACRO INIT A B  \n",
        "LDA A\n",
        ".ENDMACRO\n",
        ".OUT \"DONE\"\n",
        ".BYTE $FF\n",
    );
    assert_eq!(output, expected);
}

#[test]
fn a_second_conversion_leaves_the_output_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("widget.mac");
    let source = concat!(
        "TITLE WIDGET\n",
        "RADIX 8\n",
        "START:  LDAI 101\n",
        "        STA 377\n",
        "377\n",
    );
    fs::write(&source_path, source).expect("write source");

    let first_path = output_path(&source_path);
    convert_file(&source_path, &first_path, &[]).expect("first conversion");
    let first = fs::read_to_string(&first_path).expect("read first output");

    let second_path = dir.path().join("widget.again.asm");
    convert_file(&first_path, &second_path, &[]).expect("second conversion");
    let second = fs::read_to_string(&second_path).expect("read second output");

    assert_eq!(first, second);
}

#[test]
fn malformed_sources_still_convert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("ragged.mac");
    fs::write(
        &source_path,
        "A <B\n>C>\n\"unterminated\nCOMMENT !\nnever closed",
    )
    .expect("write source");

    let converted_path = output_path(&source_path);
    convert_file(&source_path, &converted_path, &[]).expect("conversion succeeds");

    let output = fs::read_to_string(&converted_path).expect("read output");
    assert!(!output.is_empty());
}

#[test]
fn a_missing_source_file_reports_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("absent.mac");
    let converted_path = output_path(&source_path);
    assert!(convert_file(&source_path, &converted_path, &[]).is_err());
}
