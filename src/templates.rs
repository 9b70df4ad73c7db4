use crate::config::UploadConfig;
use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct UploadFormTemplate {
    pub title: &'static str,
    pub max_file_size: Option<String>,
}

impl UploadFormTemplate {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            title: "Upload new File",
            max_file_size: config.max_file_size.map(human_size),
        }
    }
}

fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 && value % 1024 == 0 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}
