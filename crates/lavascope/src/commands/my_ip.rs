//! Public IP lookup.

use lavascope_api::ResolvedAddress;
use lavascope_api::public_ip;
use lavascope_core::IpType;

use crate::cli::{GlobalOpts, MyIpArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

/// Race the profile's endpoints for one address family.
pub async fn lookup(resolved: &Resolved, ip_type: IpType) -> Result<ResolvedAddress, CliError> {
    let transport = resolved.controller.transport();
    let http = transport.build_client()?;
    let endpoints = resolved.profile.ip_endpoints(ip_type);
    Ok(public_ip::resolve(&http, &endpoints, transport.timeout).await?)
}

pub async fn handle(
    args: MyIpArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ip_type = if args.ipv6 { IpType::V6 } else { IpType::V4 };
    let address = lookup(resolved, ip_type).await?;

    let out = output::render_single(
        global.output,
        &address,
        |a| format!("{} (via {})", a.value, a.source),
        |a| a.value.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
