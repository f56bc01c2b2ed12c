use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFile,
    term,
};
use syc_lib::diagnostic::ErrorRecorder;

/// Pretty-prints the recorded errors to stderr; `error.txt` stays the
/// machine-readable account.
pub fn eprint_errors(source_name: &str, source: &str, recorder: &ErrorRecorder) {
    let file = SimpleFile::new(source_name.to_owned(), source.to_owned());
    let mut writer = term::termcolor::StandardStream::stderr(term::termcolor::ColorChoice::Auto);
    let config = term::Config::default();

    for error in recorder.picked() {
        let diagnostic = Diagnostic::error()
            .with_message(error.kind.message())
            .with_code(error.kind.code().to_string())
            .with_labels(vec![Label::primary((), error.span)]);
        let _ = term::emit(&mut writer, &config, &file, &diagnostic);
    }
}
