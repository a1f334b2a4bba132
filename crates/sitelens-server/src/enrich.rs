use anyhow::Result;

use sitelens_core::reports::HasTraits;
use sitelens_metadata::MetadataStore;

/// Attach profile traits to each row whose user has a profile on `site_id`.
///
/// One metadata lookup per page of rows; rows without a profile keep
/// `traits: null`.
pub async fn attach_traits<T: HasTraits>(metadata: &dyn MetadataStore, site_id: i64, rows: &mut [T]) -> Result<()> {
    let mut user_ids: Vec<String> = rows.iter().map(|r| r.user_id().to_string()).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    if user_ids.is_empty() {
        return Ok(());
    }

    let traits = metadata.user_traits(site_id, &user_ids).await?;
    for row in rows.iter_mut() {
        if let Some(value) = traits.get(row.user_id()) {
            row.set_traits(value.clone());
        }
    }
    Ok(())
}
