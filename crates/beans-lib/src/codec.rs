//! Bean file codec: YAML front matter between `---` lines, a blank line,
//! then the markdown body.
//!
//! The id and slug are not stored in the front matter; they come from the
//! filename (see [`crate::ids::parse_filename`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BeansError, Result};
use crate::ids::parse_filename;
use crate::model::{Bean, BeanType, Link, Priority, Status};

const DELIMITER: &str = "---";

/// On-disk front matter. Key order here is the order written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    title: String,
    #[serde(default)]
    status: Status,
    #[serde(rename = "type", default)]
    bean_type: BeanType,
    #[serde(default)]
    priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git_fork_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git_merged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git_merge_commit: Option<String>,
}

impl From<&Bean> for FrontMatter {
    fn from(bean: &Bean) -> Self {
        Self {
            title: bean.title.clone(),
            status: bean.status.clone(),
            bean_type: bean.bean_type.clone(),
            priority: bean.priority,
            tags: bean.tags.clone(),
            created_at: Some(bean.created_at),
            updated_at: Some(bean.updated_at),
            links: bean.links.clone(),
            git_branch: bean.git_branch.clone(),
            git_created_at: bean.git_created_at,
            git_fork_commit: bean.git_fork_commit.clone(),
            git_merged_at: bean.git_merged_at,
            git_merge_commit: bean.git_merge_commit.clone(),
        }
    }
}

/// Render a bean to its file content.
///
/// The body is written without trailing newlines followed by exactly one;
/// an empty body produces no blank line after the closing delimiter.
pub fn encode(bean: &Bean) -> Result<String> {
    let yaml = serde_yaml::to_string(&FrontMatter::from(bean))?;
    let mut out = String::with_capacity(yaml.len() + bean.body.len() + 16);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');

    let body = bean.body.trim_end_matches('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

/// Split file content into `(yaml, body)`.
fn split(content: &str) -> std::result::Result<(&str, &str), String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or_else(|| "missing opening front matter delimiter".to_string())?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }
    Err("missing closing front matter delimiter".to_string())
}

/// Decode file content into a bean. `rel_path` is relative to the store root
/// and supplies the id and slug.
///
/// Hand-written files may omit the timestamps; they then default to the Unix
/// epoch here and to the file's modification time in [`read_bean`].
pub fn decode(rel_path: &Path, content: &str) -> Result<Bean> {
    decode_with_time(rel_path, content, DateTime::<Utc>::UNIX_EPOCH)
}

fn decode_with_time(rel_path: &Path, content: &str, fallback: DateTime<Utc>) -> Result<Bean> {
    let parse_err = |reason: String| BeansError::Parse {
        path: rel_path.to_path_buf(),
        reason,
    };

    let file_name = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| parse_err("non UTF-8 filename".to_string()))?;
    let (id, slug) = parse_filename(file_name)
        .ok_or_else(|| parse_err("filename does not follow the bean naming scheme".to_string()))?;

    let (yaml, body) = split(content).map_err(parse_err)?;
    let fm: FrontMatter = serde_yaml::from_str(yaml).map_err(|e| parse_err(e.to_string()))?;
    if fm.title.trim().is_empty() {
        return Err(parse_err("title must not be empty".to_string()));
    }

    let body = body.replace("\r\n", "\n");
    let body = body.strip_prefix('\n').unwrap_or(&body);

    Ok(Bean {
        id,
        slug,
        path: rel_path.to_path_buf(),
        title: fm.title,
        status: fm.status,
        bean_type: fm.bean_type,
        priority: fm.priority,
        tags: fm.tags,
        links: fm.links,
        body: body.trim_end_matches('\n').to_string(),
        created_at: fm.created_at.unwrap_or(fallback),
        updated_at: fm.updated_at.or(fm.created_at).unwrap_or(fallback),
        git_branch: fm.git_branch,
        git_created_at: fm.git_created_at,
        git_fork_commit: fm.git_fork_commit,
        git_merged_at: fm.git_merged_at,
        git_merge_commit: fm.git_merge_commit,
    })
}

/// Read and decode the bean at `root/rel_path`.
pub fn read_bean(root: &Path, rel_path: &Path) -> Result<Bean> {
    let path = root.join(rel_path);
    let content = fs::read_to_string(&path)?;
    let modified = fs::metadata(&path)
        .and_then(|m| m.modified())
        .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from);
    decode_with_time(rel_path, &content, modified)
}

/// Atomically write `content` to `path` (temp file in the same directory,
/// then rename).
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("bean");
    let tmp_path: PathBuf = dir.join(format!(".{file_name}.tmp"));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}
