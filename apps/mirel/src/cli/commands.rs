//! # CLI Command Implementations
//!
//! Every command works against a snapshot file: it is read (or an empty
//! mirror is created when it does not exist), the command runs, and
//! mutating commands write the snapshot back only after full success.

use crate::api::{self, EventRequest, LinkDetailResponse, LinkJson};
use crate::config::MirelConfig;
use mirel_core::{
    Link, LinkId, MirelError, Mirror,
    primitives::{MAX_EVENT_BATCH, MAX_LOAD_LINKS, MAX_SNAPSHOT_PAYLOAD_SIZE},
    snapshot::{export_snapshot, import_snapshot, snapshot_checksum, snapshot_crypto_hash},
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for JSON inputs to `load` and `apply` (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Reject `path` when its on-disk size exceeds `max_size` bytes.
pub fn validate_file_size(path: &Path, max_size: u64) -> Result<(), MirelError> {
    let len = std::fs::metadata(path)
        .map_err(|e| MirelError::Io(format!("stat {}: {}", path.display(), e)))?
        .len();

    if len > max_size {
        return Err(MirelError::Io(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            len,
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to its canonical form and require a regular file.
///
/// Canonicalization resolves `..` and symlinks before the file check, so
/// traversal tricks in user-supplied paths collapse to their real target.
pub fn validate_file_path(path: &Path) -> Result<PathBuf, MirelError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| MirelError::Io(format!("cannot resolve {}: {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(MirelError::Io(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: canonical parent directory plus the original
/// file name. The parent must already exist.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, MirelError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| MirelError::Io(format!("cannot resolve {}: {}", parent.display(), e)))?;

    if !canonical_parent.is_dir() {
        return Err(MirelError::Io(format!(
            "{} is not a directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| MirelError::Io("output path has no file name".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
///
/// Host and port resolve command-line flag first, then the config file,
/// then the built-in default.
pub async fn cmd_serve(
    snapshot_path: &Path,
    config: &MirelConfig,
    host: Option<&str>,
    port: Option<u16>,
) -> Result<(), MirelError> {
    let host = host.unwrap_or(&config.server.host);
    let port = port.unwrap_or(config.server.port);

    let mirror = load_or_create_mirror(snapshot_path)?;

    println!("mirel server");
    println!("  host      {}", host);
    println!("  port      {}", port);
    println!("  snapshot  {:?}", snapshot_path);
    println!("  links     {}", mirror.len());
    println!();
    println!("Routes: GET /health /status /metrics /links /links/{{id}}");
    println!("        POST /query /events /export");
    println!();
    println!("Ctrl+C stops the server.");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, mirror, &config.server).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show mirror status.
pub fn cmd_status(snapshot_path: &Path, json_mode: bool) -> Result<(), MirelError> {
    let mirror = load_or_create_mirror(snapshot_path)?;
    let metrics = mirror.metrics();

    if json_mode {
        let output = serde_json::json!({
            "snapshot": snapshot_path.to_string_lossy(),
            "link_count": metrics.link_count,
            "reference_count": metrics.reference_count,
            "resolved_references": metrics.resolved_references,
            "dangling_references": metrics.dangling_references,
            "type_count": metrics.type_count,
            "resolved_permille": metrics.resolved_permille()
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return Ok(());
    }

    println!("mirel Mirror Status");
    println!("===================");
    println!("Snapshot: {:?}", snapshot_path);
    println!();
    println!("Links:               {}", metrics.link_count);
    println!("References:          {}", metrics.reference_count);
    println!("Resolved References: {}", metrics.resolved_references);
    println!("Dangling References: {}", metrics.dangling_references);
    println!("Types:               {}", metrics.type_count);
    println!(
        "Resolved:            {} per thousand",
        metrics.resolved_permille()
    );

    Ok(())
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Bulk load links from a JSON file, replacing the snapshot.
pub fn cmd_load(snapshot_path: &Path, file: &Path) -> Result<(), MirelError> {
    tracing::info!("Loading links from {:?}", file);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_INPUT_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| MirelError::Io(format!("read {}: {}", validated_path.display(), e)))?;

    let parsed: Vec<LinkJson> = serde_json::from_slice(&contents)
        .map_err(|e| MirelError::InvalidLink(format!("invalid link file: {}", e)))?;

    if parsed.len() > MAX_LOAD_LINKS {
        return Err(MirelError::InvalidLink(format!(
            "link count {} exceeds maximum allowed {}",
            parsed.len(),
            MAX_LOAD_LINKS
        )));
    }

    let links: Vec<Link> = parsed.into_iter().map(LinkJson::into_link).collect();
    let count = links.len();

    let mirror = Mirror::load(links)?;
    save_mirror(&mirror, snapshot_path)?;

    let metrics = mirror.metrics();
    println!("Loaded {} links", count);
    println!(
        "Mirror now has {} links, {} dangling references",
        metrics.link_count, metrics.dangling_references
    );

    Ok(())
}

// =============================================================================
// APPLY COMMAND
// =============================================================================

/// Apply change feed events from a JSON file to the snapshot.
///
/// The snapshot is rewritten only when every event applies; a failed
/// batch leaves the file untouched.
pub fn cmd_apply(snapshot_path: &Path, file: &Path) -> Result<(), MirelError> {
    tracing::info!("Applying events from {:?}", file);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_INPUT_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| MirelError::Io(format!("read {}: {}", validated_path.display(), e)))?;

    let value: serde_json::Value = serde_json::from_slice(&contents)
        .map_err(|e| MirelError::InvalidLink(format!("invalid event file: {}", e)))?;

    // Accept a single event object or an array of them
    let requests: Vec<EventRequest> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<EventRequest>(value).map(|event| vec![event])
    }
    .map_err(|e| MirelError::InvalidLink(format!("invalid event file: {}", e)))?;

    if requests.len() > MAX_EVENT_BATCH {
        return Err(MirelError::InvalidLink(format!(
            "event count {} exceeds maximum allowed {}",
            requests.len(),
            MAX_EVENT_BATCH
        )));
    }

    let events = requests
        .iter()
        .map(EventRequest::to_event)
        .collect::<Result<Vec<_>, _>>()?;

    let mut mirror = load_or_create_mirror(snapshot_path)?;
    let applied = mirror.apply_all(events)?;
    save_mirror(&mirror, snapshot_path)?;

    let metrics = mirror.metrics();
    println!("Applied {} events", applied);
    println!(
        "Mirror now has {} links, {} dangling references",
        metrics.link_count, metrics.dangling_references
    );

    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Execute a predicate query against the snapshot.
pub fn cmd_query(snapshot_path: &Path, predicate: &str, json_mode: bool) -> Result<(), MirelError> {
    let value: serde_json::Value = serde_json::from_str(predicate)
        .map_err(|e| MirelError::InvalidPredicate(format!("not valid JSON: {}", e)))?;

    let mirror = load_or_create_mirror(snapshot_path)?;
    let matches = mirror.query_json(&value)?;

    if json_mode {
        let links: Vec<LinkJson> = matches.into_iter().map(Into::into).collect();
        println!("{}", serde_json::to_string_pretty(&links).unwrap_or_default());
        return Ok(());
    }

    println!("{} links matched", matches.len());
    for link in matches {
        println!("{}", format_link_line(link));
    }

    Ok(())
}

/// One-line text rendering of a link.
fn format_link_line(link: &Link) -> String {
    let mut line = format!("link {}", link.id);
    if let Some(type_id) = link.type_id {
        line.push_str(&format!("  type={}", type_id));
    }
    if let Some(from_id) = link.from_id {
        line.push_str(&format!("  from={}", from_id));
    }
    if let Some(to_id) = link.to_id {
        line.push_str(&format!("  to={}", to_id));
    }
    if !link.props.is_empty() {
        line.push_str(&format!(
            "  props={}",
            serde_json::Value::Object(link.props.clone())
        ));
    }
    line
}

// =============================================================================
// GET COMMAND
// =============================================================================

/// Show one link with its resolved references and adjacency.
pub fn cmd_get(snapshot_path: &Path, id: u64, json_mode: bool) -> Result<(), MirelError> {
    let mirror = load_or_create_mirror(snapshot_path)?;

    let Some(detail) = LinkDetailResponse::from_store(mirror.store(), LinkId(id)) else {
        println!("Link {} not found", id);
        return Ok(());
    };

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&detail).unwrap_or_default());
        return Ok(());
    }

    if let Some(link) = mirror.get(LinkId(id)) {
        println!("{}", format_link_line(link));
    }

    let has_references = detail.link.type_id.is_some()
        || detail.link.from_id.is_some()
        || detail.link.to_id.is_some();
    if has_references {
        println!();
        println!("References:");
        print_reference("type", detail.link.type_id, detail.type_link.is_some());
        print_reference("from", detail.link.from_id, detail.from_link.is_some());
        print_reference("to", detail.link.to_id, detail.to_link.is_some());
    }

    println!();
    println!("Typed by: {:?}", detail.typed);
    println!("Outgoing: {:?}", detail.outgoing);
    println!("Incoming: {:?}", detail.incoming);

    Ok(())
}

fn print_reference(name: &str, target: Option<u64>, resolved: bool) {
    if let Some(target) = target {
        let state = if resolved { "resolved" } else { "dangling" };
        println!("  {:<5} {} ({})", name, target, state);
    }
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the snapshot in canonical format.
pub fn cmd_export(snapshot_path: &Path, output: &Path) -> Result<(), MirelError> {
    let validated_output = validate_output_path(output)?;

    let mirror = load_or_create_mirror(snapshot_path)?;
    let store = mirror.store();

    let data = export_snapshot(store)?;
    let checksum = snapshot_checksum(store)?;
    let hash = snapshot_crypto_hash(store)?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| MirelError::Io(format!("write {}: {}", validated_output.display(), e)))?;

    println!("{} bytes written to {:?}", data.len(), validated_output);
    println!("Checksum: {:016x}", checksum);
    println!("BLAKE3:   {}", hash);

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load a mirror from a snapshot path, or create an empty one.
pub fn load_or_create_mirror(snapshot_path: &Path) -> Result<Mirror, MirelError> {
    if snapshot_path.exists() {
        validate_file_size(snapshot_path, MAX_SNAPSHOT_PAYLOAD_SIZE as u64)?;

        let data = std::fs::read(snapshot_path)
            .map_err(|e| MirelError::Io(format!("Read snapshot: {}", e)))?;

        let store = import_snapshot(&data)?;
        Ok(Mirror::from_store(store))
    } else {
        Ok(Mirror::new())
    }
}

/// Save a mirror to a snapshot path in canonical format.
pub fn save_mirror(mirror: &Mirror, snapshot_path: &Path) -> Result<(), MirelError> {
    let data = export_snapshot(mirror.store())?;
    std::fs::write(snapshot_path, &data)
        .map_err(|e| MirelError::Io(format!("Write snapshot: {}", e)))?;
    Ok(())
}
