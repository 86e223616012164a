//! Saved address commands.

use shopfront_client::api::NewAddress;
use shopfront_client::views::AddressListView;
use shopfront_client::{Result, Storefront};
use shopfront_core::AddressId;

use super::render;

/// List saved addresses.
///
/// # Errors
///
/// Returns an error if the addresses cannot be fetched.
pub async fn list(store: &Storefront) -> Result<String> {
    let addresses = store.api().list_addresses().await?;
    render(&AddressListView {
        addresses: &addresses,
    })
}

/// Save an address.
///
/// # Errors
///
/// Returns an error if the server refuses the address.
pub async fn add(store: &Storefront, address: &NewAddress) -> Result<String> {
    let created = store.api().create_address(address).await?;
    Ok(format!(
        "Saved address #{} ({}, {}).",
        created.id, created.start_line, created.city
    ))
}

/// Delete an address.
///
/// # Errors
///
/// Returns an error if the address cannot be deleted.
pub async fn delete(store: &Storefront, id: AddressId) -> Result<String> {
    store.api().delete_address(id).await?;
    Ok(format!("Deleted address #{id}."))
}
