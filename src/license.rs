//! Version and license text for `--version` and `--license`.

pub const COPYRIGHT: &str = "Copyright (c) 2025 Qx Development Team";

const MIT_LICENSE: &str = "\
MIT License

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.";

const NOTICE_RULE: &str =
    "-------------------------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNotice {
    pub name: &'static str,
    pub license: &'static str,
    pub project_url: &'static str,
}

const fn dependency(
    name: &'static str,
    license: &'static str,
    project_url: &'static str,
) -> DependencyNotice {
    DependencyNotice {
        name,
        license,
        project_url,
    }
}

/// Built once by [`crate::run`] and handed to whatever prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub license: &'static str,
    pub dependencies: Vec<DependencyNotice>,
}

impl LicenseInfo {
    pub fn collect() -> Self {
        Self {
            name: "qx",
            version: env!("CARGO_PKG_VERSION"),
            license: "MIT",
            dependencies: vec![
                dependency("anyhow", "MIT OR Apache-2.0", "https://github.com/dtolnay/anyhow"),
                dependency("bytes", "MIT", "https://github.com/tokio-rs/bytes"),
                dependency("chrono", "MIT OR Apache-2.0", "https://github.com/chronotope/chrono"),
                dependency("chrono-tz", "MIT OR Apache-2.0", "https://github.com/chronotope/chrono-tz"),
                dependency("clap", "MIT OR Apache-2.0", "https://github.com/clap-rs/clap"),
                dependency("dotenvy", "MIT", "https://github.com/allan2/dotenvy"),
                dependency("futures", "MIT OR Apache-2.0", "https://github.com/rust-lang/futures-rs"),
                dependency("rand", "MIT OR Apache-2.0", "https://github.com/rust-random/rand"),
                dependency("reqwest", "MIT OR Apache-2.0", "https://github.com/seanmonstar/reqwest"),
                dependency("serde", "MIT OR Apache-2.0", "https://github.com/serde-rs/serde"),
                dependency("serde_json", "MIT OR Apache-2.0", "https://github.com/serde-rs/json"),
                dependency("thiserror", "MIT OR Apache-2.0", "https://github.com/dtolnay/thiserror"),
                dependency("tokio", "MIT", "https://github.com/tokio-rs/tokio"),
                dependency("tokio-retry", "MIT", "https://github.com/srijs/rust-tokio-retry"),
                dependency("tracing", "MIT", "https://github.com/tokio-rs/tracing"),
                dependency("tracing-appender", "MIT", "https://github.com/tokio-rs/tracing"),
                dependency("tracing-subscriber", "MIT", "https://github.com/tokio-rs/tracing"),
            ],
        }
    }

    pub fn version_text(&self) -> String {
        format!("{} version {}\n{COPYRIGHT}", self.name, self.version)
    }

    pub fn license_text(&self) -> String {
        let mut text = format!(
            "{} {} is licensed under the {} license.\n\n{COPYRIGHT}\n\n{MIT_LICENSE}\n\n",
            self.name, self.version, self.license
        );
        text.push_str("THIRD-PARTY NOTICES\n");
        for dep in &self.dependencies {
            text.push_str(NOTICE_RULE);
            text.push('\n');
            text.push_str(&format!(
                "{}\nLicense: {}\nProject: {}\n",
                dep.name, dep.license, dep.project_url
            ));
        }
        text.push_str(NOTICE_RULE);
        text
    }
}
