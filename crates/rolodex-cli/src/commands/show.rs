use rolodex_core::{Contact, DatabaseService};

use crate::commands::common::{
    contact_to_list_item, format_contact_detail, normalize_contact_identifier, now_ms,
};
use crate::error::CliError;

pub async fn find_contact(store: &DatabaseService, external_id: &str) -> Result<Contact, CliError> {
    let external_id = normalize_contact_identifier(external_id)?;
    store
        .get_contact(&external_id)
        .await?
        .ok_or(CliError::ContactNotFound(external_id))
}

pub async fn run_show(
    store: &DatabaseService,
    external_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let contact = find_contact(store, external_id).await?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&contact_to_list_item(&contact))?
        );
    } else {
        for line in format_contact_detail(&contact, now_ms()) {
            println!("{line}");
        }
    }
    Ok(())
}
