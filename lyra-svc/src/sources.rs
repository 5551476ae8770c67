//! Remote template source normalization
//!
//! Stack records keep the URLs a template came from. Only http(s) sources
//! are kept; raw github content URLs rewrite to their canonical blob form.

const RAW_GITHUB_HOST: &str = "raw.githubusercontent.com";

/// Normalize template-source inputs. `file://` URLs and anything that is not
/// http(s) are dropped silently.
pub fn normalize_remote_sources(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .filter_map(|input| normalize_one(input))
        .collect()
}

fn normalize_one(input: &str) -> Option<String> {
    let (scheme, rest) = input.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, path),
        None => (rest, ""),
    };
    if host.is_empty() {
        return None;
    }
    if host == RAW_GITHUB_HOST {
        // raw.githubusercontent.com/<owner>/<repo>/<ref>/<path> becomes
        // github.com/<owner>/<repo>/blob/<ref>/<path>
        let segments: Vec<&str> = path.splitn(4, '/').collect();
        if let [owner, repo, git_ref, file_path] = segments[..] {
            return Some(format!(
                "{scheme}://github.com/{owner}/{repo}/blob/{git_ref}/{file_path}"
            ));
        }
        return Some(format!("{scheme}://github.com/{path}"));
    }
    Some(input.to_string())
}
