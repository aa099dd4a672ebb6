// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt devices` command: list the device registry.

use device_hal::Device;
use runtime::RuntimeConfig;

pub async fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    let (manager, reference) = super::device_manager(&config)?;

    println!(
        "  {:<18} {:<20} {:<12} {:<12} {:<10} Capabilities",
        "Id", "Name", "Vendor", "Type", "Status",
    );
    println!("  {}", "-".repeat(100));

    for id in manager.all_device_ids() {
        let Some(device) = manager.get_device(id) else { continue };
        println!(
            "  {:<18} {:<20} {:<12} {:<12} {:<10} {}",
            format!("{id:#018x}"),
            manager.get_device_name(id),
            device.vendor().unwrap_or_else(|_| "?".into()),
            field(device.device_type()),
            field(device.status()),
            describe_capabilities(device.as_ref()),
        );
    }
    println!();
    println!(
        "  Reference memory: budget {}, {}",
        config.reference.memory_budget,
        reference.memory_stats().summary()
    );
    Ok(())
}

fn field<T: std::fmt::Display, E>(value: Result<T, E>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|_| "?".into())
}

fn describe_capabilities(device: &dyn Device) -> String {
    match device.capabilities() {
        Ok(caps) => caps.summary(),
        Err(e) => format!("unavailable ({e})"),
    }
}
