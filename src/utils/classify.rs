//! Committed-file classification: stats exclusion and file type.

use once_cell::sync::Lazy;
use regex::Regex;

/// Paths matching any of these are left out of the "changed" commit stats.
///
/// Order matters only for speed; the first match wins.
static EXCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // vendored deps, cocoapods, build output, wrapped SDKs, IDE folders at the repo root
        Regex::new(r"^(vendor|Pods|target|YoutuOCWrapper|vos-app-protection|vos-processor|\.idea|\.vscode)/.")
            .expect("valid regex"),
        // cocoapods one level down
        Regex::new(r"^[a-zA-Z0-9_]*?/Pods/").expect("valid regex"),
        // Xcode project bundles
        Regex::new(r"^.*(xcodeproj|xcworkspace)/.").expect("valid regex"),
        // lockfiles, backups, binaries
        Regex::new(r"^.*\.(jar|pbxproj|lock|bk|bak|backup|class|swp|sum|pdf|png)$")
            .expect("valid regex"),
        Regex::new(r"^.*/?package-lock\.json$").expect("valid regex"),
        // framework build output and tooling directories
        Regex::new(r"^.*/?(\.next|node_modules|\.devcontainer)(/|$).*").expect("valid regex"),
        // bundler partials
        Regex::new(r"(^|.*/)_.*\.(js|scss)$").expect("valid regex"),
    ]
});

/// Check if a committed path should be ignored when computing commit stats.
///
/// # Arguments
/// * `path` - Repository-relative path, `/`-separated
///
/// # Returns
/// `true` if the path matches one of the exclusion patterns
pub fn should_exclude_from_stats(path: &str) -> bool {
    EXCLUDE_PATTERNS.iter().any(|re| re.is_match(path))
}

/// Derive the stored file type of a committed path.
///
/// Returns `"hidden"` when the path (minus extension) starts with a dot,
/// the lower-cased extension without the dot when there is one, and
/// `"generic"` otherwise.
pub fn file_type(path: &str) -> String {
    let (stem, ext) = split_extension(path);
    if stem.starts_with('.') {
        "hidden".to_string()
    } else if !ext.is_empty() {
        ext[1..].to_lowercase()
    } else {
        "generic".to_string()
    }
}

/// Split `path` into `(stem, ".ext")`.
///
/// Only the last component is searched and leading dots of that component
/// never start an extension, so `.gitignore` has none.
fn split_extension(path: &str) -> (&str, &str) {
    let base_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let base = &path[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();

    match base[leading_dots..].rfind('.') {
        Some(idx) => path.split_at(base_start + leading_dots + idx),
        None => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_vendored_and_lock_files() {
        let excluded = [
            "vendor/librar/stuff/blah.go",
            "vendor/librar/stuff/README.md",
            "go.sum",
            "lib/my_stupid_jar/blah.jar",
            "java.jar",
            "somepath/logo.png",
            "stuff.pdf",
            "Accelerator.xcodeproj/project.pbxproj",
            "Podfile.lock",
            "Pods/Firebase/CoreOnly/Sources/Firebase.h",
            "Something/Pods/Firebase.h",
            "yarn.lock",
            "package-lock.json",
            "someapp/package-lock.json",
            "node_modules/.app.js",
            "someapp/node_modules/.app.js",
            "someapp/.next/_app.js",
            "webretail/.next/static/chunks/pages/_app.js",
            "webretail/.next/static/webpack/pages/indexupdate.js",
            "webretail/.next/server/pages/_document.js",
            "common/assets/Styling/_mixins.scss",
            ".vscode/settings.json",
            ".idea/misc.xml",
            "target/output/pom.xml",
            "src/pom.xml.bak",
            ".devcontainer/docker-compose.yml",
            ".devcontainer/local-data/keycloak-data.json",
            "YoutuOCWrapper/include/ocr.h",
            "vos-app-protection/lib/guard.a",
            "vos-processor/config.json",
        ];
        for path in excluded {
            assert!(should_exclude_from_stats(path), "{path} should be excluded");
        }
    }

    #[test]
    fn test_keeps_regular_sources() {
        let kept = [
            "src/main/my/company/package/Application.java",
            "src/resources/application.yaml",
            "Something/another/Pods/Firebase.h",
            "package.json",
            "node_modules.txt",
            ".next.d",
            // look like IDE folders but lack the leading dot
            "idea/misc.xml",
            "vscode/settings.json",
        ];
        for path in kept {
            assert!(!should_exclude_from_stats(path), "{path} should be counted");
        }
    }

    #[test]
    fn test_file_type() {
        assert_eq!(file_type("README.md"), "md");
        assert_eq!(file_type("src/App.JS"), "js");
        assert_eq!(file_type("Makefile"), "generic");
        assert_eq!(file_type(".gitignore"), "hidden");
        assert_eq!(file_type(".github/workflows/ci.yml"), "hidden");
        assert_eq!(file_type("docs/.hidden"), "generic");
        assert_eq!(file_type("archive.tar.gz"), "gz");
    }
}
