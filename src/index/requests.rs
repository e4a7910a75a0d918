use tracing::info;

use super::log_failure;
use crate::db::Store;
use crate::error::Result;
use crate::platform::RequestSource;
use crate::utils::{display_url, format_with_commas};

/// Index closed and merged requests of one hosted project.
///
/// Returns how many requests were stored by this call. Requests already
/// stored for the repository are skipped; on failure the error is logged
/// and the rows written before it are kept and counted.
pub fn index_merge_requests(store: &Store, source: &dyn RequestSource) -> usize {
    let log_url = display_url(source.clone_url());
    let mut n_requests = 0;
    if let Err(e) = try_index_merge_requests(store, source, &log_url, &mut n_requests) {
        log_failure(&log_url, &e);
    }
    n_requests
}

fn try_index_merge_requests(
    store: &Store,
    source: &dyn RequestSource,
    log_url: &str,
    n_requests: &mut usize,
) -> Result<()> {
    let repo = store.ensure_repository(source.clone_url(), source.platform().as_str())?;
    if !repo.is_active {
        info!("Skipping inactive repository {}", log_url);
        return Ok(());
    }

    info!("Starting to index merge requests for {}", log_url);

    for request in source.closed_requests()? {
        let request_id = request.request_id();
        if store.merge_request_exists(repo.id, &request_id)? {
            continue;
        }
        let request = source.resolve(request)?;
        store.insert_merge_request(repo.id, &request.to_merge_request())?;
        *n_requests += 1;
    }

    if *n_requests > 0 {
        info!("Indexed {} merge requests in {}", format_with_commas(*n_requests), log_url);
    }
    Ok(())
}
