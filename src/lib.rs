//! Driver library for the `cppmono` command line tool.
//!
//! Reads C++ sources, runs the template simplification core and returns the
//! simplified token streams as text.

use std::fs;
use std::time::Instant;

use tracing::info;

use cppmono_core::{
    find_unbalanced_angle_brackets, simplify_std_types, simplify_templates, tokenize,
    DynError, Settings, TracingLogger,
};

pub struct CppmonoOptions {
    pub files: Vec<String>,
    /// Optional TOML file with [`Settings`] values.
    pub settings_file: Option<String>,
    pub debug_warnings: bool,
    /// Probe angle-bracket balance and fail instead of simplifying.
    pub check_syntax: bool,
    /// Emit the simplified stream for each input file.
    pub print_stream: bool,
}

pub fn run_main(opts: &CppmonoOptions) -> Result<Option<String>, DynError> {
    let total_start = Instant::now();

    if opts.files.is_empty() {
        return Err("No input files provided".into());
    }

    let mut settings = match &opts.settings_file {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Settings::from_toml_str(&text)?
        }
        None => Settings::default(),
    };
    settings.debug_warnings |= opts.debug_warnings;

    let mut logger = TracingLogger;
    let mut outputs = Vec::new();

    for (index, path) in opts.files.iter().enumerate() {
        let source = fs::read_to_string(path)?;
        let parse_start = Instant::now();
        let mut stream =
            tokenize(&source, index as u32).map_err(|e| format!("{}: {}", path, e))?;
        simplify_std_types(&mut stream);
        info!(
            "Tokenized {}: {:.2}s",
            path,
            parse_start.elapsed().as_secs_f64()
        );

        if opts.check_syntax {
            if let Some(tok) = find_unbalanced_angle_brackets(&stream) {
                return Err(format!(
                    "{}:{}: unbalanced angle brackets near '{}'",
                    path,
                    stream.token(tok).line,
                    stream.text(tok)
                )
                .into());
            }
            continue;
        }

        let simplify_start = Instant::now();
        let with_templates = simplify_templates(&mut stream, &mut logger, &settings);
        info!(
            "Simplified {}: {:.2}s (templates: {})",
            path,
            simplify_start.elapsed().as_secs_f64(),
            with_templates
        );

        if opts.print_stream {
            outputs.push(stream.render());
        }
    }

    info!("Total time: {:.2}s", total_start.elapsed().as_secs_f64());

    if outputs.is_empty() {
        Ok(None)
    } else {
        Ok(Some(outputs.join("\n")))
    }
}
