use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  base-url: {}", self.base_url());
        println!("  model: {}", self.model());
        println!("  api-key-env: {}", self.api_key_env());
        println!("  upload-url: {}", self.upload_url());
        println!(
            "  reveal-interval-ms: {}",
            self.reveal_interval().as_millis()
        );
        match self.request_timeout() {
            Some(timeout) => println!("  request-timeout-secs: {}", timeout.as_secs()),
            None => println!("  request-timeout-secs: (none)"),
        }
        match &self.data_dir {
            Some(dir) => println!("  data-dir: {}", path_display(dir)),
            None => println!("  data-dir: (platform default)"),
        }
    }
}
