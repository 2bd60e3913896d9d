//! The `doctor` command: check system requirements and configuration.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::error::Result;

pub fn run_doctor(settings: &Settings) -> Result<()> {
    Output::header("Tolk Doctor");

    let mut problems = 0;

    Output::header("External tools");
    for tool in ["yt-dlp", "ffmpeg", "whisper-cli"] {
        match preflight::check_tool(tool) {
            Ok(()) => Output::list_item(&format!("{tool}: ok")),
            Err(e) => {
                problems += 1;
                Output::list_item(&format!("{tool}: {e}"));
            }
        }
    }

    Output::header("Speech model");
    let model_path = settings.model_path();
    if model_path.is_file() {
        Output::list_item(&format!("{}: ok", model_path.display()));
    } else {
        problems += 1;
        Output::list_item(&format!("{}: missing", model_path.display()));
    }

    Output::header("Synthesis API");
    if settings.api_key().is_some() {
        Output::list_item("API key: configured");
    } else {
        problems += 1;
        Output::list_item("API key: not set (export ANTHROPIC_API_KEY='sk-ant-...')");
    }

    Output::header("Configuration");
    Output::kv(
        "Config file",
        &Settings::default_config_path().display().to_string(),
    );
    Output::kv("Working dir", &settings.work_dir().display().to_string());
    Output::kv("Model", &settings.synthesis.model);

    println!();
    if problems == 0 {
        Output::success("All checks passed.");
    } else {
        Output::warning(&format!("{problems} problem(s) found."));
    }

    Ok(())
}
