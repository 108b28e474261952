use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

pub const UPLOADS_DIR: &str = "website/uploads";
pub const THEMES_DIR: &str = "website/themes";
const DB_DIR: &str = "website/db";

const REQUIRED_DIRS: &[&str] = &["website", DB_DIR, UPLOADS_DIR, THEMES_DIR, "website/templates"];

/// Fallback pages rendered outside any theme
const SERVER_TEMPLATES: &[&str] = &[
    "website/templates/error.html.tera",
    "website/templates/preview.html.tera",
];

/// Tally of problems found while preparing the data directories.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootReport {
    pub warnings: u32,
    pub errors: u32,
}

impl BootReport {
    fn warn(&mut self, msg: String) {
        warn!("  {}", msg);
        self.warnings += 1;
    }

    fn fail(&mut self, msg: String) {
        error!("  {}", msg);
        self.errors += 1;
    }

    pub fn is_fatal(&self) -> bool {
        self.errors > 0
    }
}

/// Creates missing directories under `root` and checks that the server
/// templates exist and the data directories accept writes. Only an
/// unusable database directory or a directory that cannot be created is
/// an error.
pub fn check(root: &Path) -> BootReport {
    let mut report = BootReport::default();

    for dir in REQUIRED_DIRS {
        let path = root.join(dir);
        if path.exists() {
            continue;
        }
        match fs::create_dir_all(&path) {
            Ok(_) => info!("  Created directory: {}", dir),
            Err(e) => report.fail(format!("FAILED to create directory {}: {}", dir, e)),
        }
    }

    for file in SERVER_TEMPLATES {
        if !root.join(file).exists() {
            report.warn(format!("Missing server template: {} (previews and error pages will 500)", file));
        }
    }

    for dir in [DB_DIR, UPLOADS_DIR, THEMES_DIR] {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        let probe = path.join(".write_test");
        match fs::write(&probe, "test") {
            Ok(_) => {
                let _ = fs::remove_file(&probe);
            }
            Err(e) if dir == DB_DIR => report.fail(format!("{} not writable: {}", dir, e)),
            Err(e) => report.warn(format!("{} not writable: {} (uploads and theme installs will fail)", dir, e)),
        }
    }

    report
}

/// Run all boot checks from the working directory. Call this before
/// Rocket launches; exits the process on a fatal report.
pub fn run() {
    info!("Inkpot boot check starting...");

    let report = check(Path::new("."));
    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found, using default config");
    }

    if report.is_fatal() {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            report.errors, report.warnings
        );
        process::exit(1);
    }
    if report.warnings > 0 {
        warn!("Boot check passed with {} warning(s).", report.warnings);
    } else {
        info!("Boot check passed.");
    }
}
