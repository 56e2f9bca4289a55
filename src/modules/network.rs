// Ravello Ansible
// Copyright (C) Riff Labs Limited <team@riff.cc>
// Based on Jetporch by Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Network design of a freshly created application.
//!
//! The service assigns ids to every new switch, subnet and ip configuration
//! when the design is saved, and later steps need those ids. Each step is
//! therefore a fetch, an edit by path and an update, and the application is
//! fetched again before the next step.

use std::net::Ipv4Addr;
use indexmap::IndexMap;
use ipnetwork::{ipv4_mask_to_prefix, Ipv4Network};
use serde_json::{json, Value};

use crate::api::RavelloApi;
use crate::error::{RavelloError, Result};
use crate::modules::design::nic_name;
use crate::template::{append, check_for_param, get, get_mut, next_item_path, set, ParamCheck, Path, Segment};

const SWITCHES: &str = "design.network.switches";
const SUBNETS: &str = "design.network.subnets";
const NETWORK_INTERFACES: &str = "design.network.services.networkInterfaces";
const DHCP_SERVERS: &str = "design.network.services.dhcpServers";
const ROUTER_IP_CONFIG_IDS: &str = "design.network.services.routers.0.ipConfigurationIds";
const DNS_IP_CONFIG_IDS: &str = "design.network.services.dnsServers.0.ipConfigurationIds";

/// The block used when no VM pins an address.
pub const DEFAULT_SUBNET: &str = "192.168.0.0/16";

/// Address blocks mapped to the design path of the object serving them.
pub type IpPathMap = Vec<(Ipv4Network, Path)>;

fn empty_list() -> ParamCheck {
    ParamCheck::required().default_if_missing(json!([]))
}

fn parse_ip(raw: &str) -> Result<Ipv4Addr> {
    raw.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| RavelloError::Template(format!("invalid IPv4 address: {}", raw)))
}

fn block(address: &str, mask: &str) -> Result<Ipv4Network> {
    let prefix = ipv4_mask_to_prefix(parse_ip(mask)?)
        .map_err(|e| RavelloError::Template(format!("invalid netmask {}: {}", mask, e)))?;
    Ipv4Network::new(parse_ip(address)?, prefix)
        .map_err(|e| RavelloError::Template(format!("invalid network {}/{}: {}", address, mask, e)))
}

/// Parse a CIDR block and normalize it to its network address.
pub fn parse_subnet(raw: &str) -> Result<Ipv4Network> {
    let net: Ipv4Network = raw
        .trim()
        .parse()
        .map_err(|e| RavelloError::Template(format!("invalid subnet {}: {}", raw, e)))?;
    normalize(net)
}

fn normalize(net: Ipv4Network) -> Result<Ipv4Network> {
    Ipv4Network::new(net.network(), net.prefix())
        .map_err(|e| RavelloError::Template(format!("invalid subnet {}: {}", net, e)))
}

fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Sort the subnets of a template and reject overlapping blocks.
pub fn plan_subnets(raw: &[String]) -> Result<Vec<Ipv4Network>> {
    let mut nets = raw.iter().map(|s| parse_subnet(s)).collect::<Result<Vec<_>>>()?;
    nets.sort_by_key(|net| (net.network(), net.prefix()));
    for pair in nets.windows(2) {
        if overlaps(&pair[0], &pair[1]) {
            return Err(RavelloError::Template(format!("Overlapping Subnets: {} and {}", pair[0], pair[1])));
        }
    }
    Ok(nets)
}

fn host(net: &Ipv4Network, offset: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(net.network()).wrapping_add(offset))
}

fn fetch(api: &dyn RavelloApi, app_id: u64) -> Result<Value> {
    api.get_application(app_id, None)
}

/// Drop the network the service generates for a new application.
pub fn delete_autogenerated_subnet(api: &dyn RavelloApi, app_id: u64) -> Result<()> {
    let mut app = fetch(api, app_id)?;
    for path in [SWITCHES, SUBNETS, NETWORK_INTERFACES, DHCP_SERVERS] {
        set(&mut app, path, json!([]))?;
    }
    api.update_application(&app)?;
    Ok(())
}

/// Add a port for `device_id` to the switch at `switch_path`. Port indexes
/// are one-based.
pub fn create_port_on_switch(app: &mut Value, switch_path: &Path, device_id: Value, device_type: &str) -> Result<()> {
    let ports = switch_path.child_key("ports");
    check_for_param(app, &ports, &empty_list())?;
    let port = next_item_path(app, &ports)?;
    let index = match port.last() {
        Some(Segment::Index(i)) => i + 1,
        _ => 1,
    };
    let segment_id = get(app, switch_path.join("networkSegments.0.id")?)?.clone();

    set(app, port.child_key("deviceId"), device_id)?;
    set(app, port.child_key("deviceType"), json!(device_type))?;
    set(app, port.child_key("index"), json!(index))?;
    let reference = port.join("networkSegmentReferences.0")?;
    set(app, reference.child_key("networkSegmentId"), segment_id)?;
    set(app, reference.child_key("anyNetworkSegment"), json!(false))?;
    set(app, reference.child_key("egressPolicy"), json!("UNTAGGED"))?;
    Ok(())
}

/// Build a switch, a subnet and the L3 services for one address block.
///
/// The L3 interface gets the first host address for DNS and the second as
/// gateway. The DHCP pool spans the whole block.
pub fn create_subnet_with_ip_pool(api: &dyn RavelloApi, app_id: u64, net: &Ipv4Network) -> Result<()> {
    let mask = net.mask().to_string();

    let mut app = fetch(api, app_id)?;
    check_for_param(&mut app, SWITCHES, &empty_list())?;
    let switch = next_item_path(&app, SWITCHES)?;
    set(&mut app, switch.join("networkSegments.0.vlanId")?, json!(1))?;
    api.update_application(&app)?;

    let mut app = fetch(api, app_id)?;
    check_for_param(&mut app, SUBNETS, &empty_list())?;
    let subnet = next_item_path(&app, SUBNETS)?;
    let segment_id = get(&app, switch.join("networkSegments.0.id")?)?.clone();
    set(&mut app, subnet.child_key("ipVersion"), json!("IPV4"))?;
    set(&mut app, subnet.child_key("mask"), json!(mask))?;
    set(&mut app, subnet.child_key("net"), json!(net.network().to_string()))?;
    set(&mut app, subnet.child_key("networkSegmentId"), segment_id)?;
    api.update_application(&app)?;

    let mut app = fetch(api, app_id)?;
    check_for_param(&mut app, NETWORK_INTERFACES, &empty_list())?;
    let l3_nic = next_item_path(&app, NETWORK_INTERFACES)?;
    set(&mut app, l3_nic.join("ipConfigurations.0.staticIpConfig")?, json!({"ip": host(net, 1).to_string(), "mask": mask}))?;
    set(&mut app, l3_nic.join("ipConfigurations.1.staticIpConfig")?, json!({"ip": host(net, 2).to_string(), "mask": mask}))?;
    api.update_application(&app)?;

    let mut app = fetch(api, app_id)?;
    let dns_config_id = get(&app, l3_nic.join("ipConfigurations.0.id")?)?.clone();
    let gateway_config_id = get(&app, l3_nic.join("ipConfigurations.1.id")?)?.clone();
    let l3_nic_id = get(&app, l3_nic.child_key("id"))?.clone();
    check_for_param(&mut app, ROUTER_IP_CONFIG_IDS, &empty_list())?;
    append(&mut app, ROUTER_IP_CONFIG_IDS, gateway_config_id.clone())?;
    create_port_on_switch(&mut app, &switch, l3_nic_id, "SERVICES")?;
    api.update_application(&app)?;

    let mut app = fetch(api, app_id)?;
    check_for_param(&mut app, DHCP_SERVERS, &empty_list())?;
    let dhcp = next_item_path(&app, DHCP_SERVERS)?;
    set(&mut app, dhcp.child_key("mask"), json!(mask))?;
    set(&mut app, dhcp.child_key("poolStart"), json!(net.network().to_string()))?;
    set(&mut app, dhcp.child_key("poolEnd"), json!(net.broadcast().to_string()))?;
    set(&mut app, dhcp.child_key("ipConfigurationId"), dns_config_id.clone())?;
    set(&mut app, dhcp.child_key("gatewayIpConfigurationId"), gateway_config_id)?;
    check_for_param(&mut app, DNS_IP_CONFIG_IDS, &empty_list())?;
    append(&mut app, DNS_IP_CONFIG_IDS, dns_config_id.clone())?;
    set(&mut app, dhcp.child_key("dnsIpConfigurationId"), dns_config_id)?;
    api.update_application(&app)?;
    Ok(())
}

fn ip_path_map(app: &Value, list: &str, address_key: &str) -> Result<IpPathMap> {
    let items = match get(app, list) {
        Ok(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };
    let base = Path::parse(list)?;
    let mut map = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let address = item.get(address_key).and_then(Value::as_str).unwrap_or_default();
        let mask = item.get("mask").and_then(Value::as_str).unwrap_or_default();
        map.push((block(address, mask)?, base.child_index(i)));
    }
    Ok(map)
}

/// Address block of every DHCP server, keyed by pool start and mask.
pub fn create_dhcp_ip_map(app: &Value) -> Result<IpPathMap> {
    ip_path_map(app, DHCP_SERVERS, "poolStart")
}

/// Address block of every subnet.
pub fn create_subnet_ip_map(app: &Value) -> Result<IpPathMap> {
    ip_path_map(app, SUBNETS, "net")
}

/// The path of the first block containing `ip`.
pub fn path_from_ip(map: &IpPathMap, ip: &str) -> Result<Path> {
    let address = parse_ip(ip)?;
    map.iter()
        .find(|(net, _)| net.contains(address))
        .map(|(_, path)| path.clone())
        .ok_or_else(|| {
            let blocks: Vec<String> = map.iter().map(|(net, _)| net.to_string()).collect();
            RavelloError::Module(format!("no subnet for ip: {} in [{}]", ip, blocks.join(", ")))
        })
}

/// The switch carrying the subnet that contains `ip`.
pub fn switch_path_from_ip(app: &Value, subnet_map: &IpPathMap, ip: &str) -> Result<Path> {
    let subnet = path_from_ip(subnet_map, ip)?;
    let segment_id = get(app, subnet.child_key("networkSegmentId"))?;
    let switches = match get(app, SWITCHES)? {
        Value::Array(items) => items,
        _ => return Err(RavelloError::Module(String::from("Invalid network segment"))),
    };
    let base = Path::parse(SWITCHES)?;
    switches
        .iter()
        .position(|switch| get(switch, "networkSegments.0.id").ok() == Some(segment_id))
        .map(|i| base.child_index(i))
        .ok_or_else(|| RavelloError::Module(String::from("Invalid network segment")))
}

/// The address a NIC of the request pins, and whether it is a DHCP
/// reservation.
pub fn pinned_ip(nic: &Value) -> Option<(String, bool)> {
    if let Ok(Value::String(ip)) = get(nic, "ipConfig.autoIpConfig.reservedIp") {
        return Some((ip.clone(), true));
    }
    if let Ok(Value::String(ip)) = get(nic, "ipConfig.staticIpConfig.ip") {
        return Some((ip.clone(), false));
    }
    None
}

fn vms(doc: &Value) -> &[Value] {
    get(doc, "design.vms").ok().and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Create one `/16` per block of VM addresses not yet covered, or the
/// default block when no VM pins an address. Returns the blocks created.
pub fn detect_ips_and_create_compatible_subnets(api: &dyn RavelloApi, app_id: u64, request: &Value) -> Result<Vec<Ipv4Network>> {
    let mut nets: Vec<Ipv4Network> = Vec::new();
    for vm in vms(request) {
        let nics = vm.get("networkConnections").and_then(Value::as_array);
        for nic in nics.into_iter().flatten() {
            if let Some((ip, _)) = pinned_ip(nic) {
                let address = parse_ip(&ip)?;
                if !nets.iter().any(|net| net.contains(address)) {
                    nets.push(normalize(Ipv4Network::new(address, 16).map_err(|e| RavelloError::Template(e.to_string()))?)?);
                }
            }
        }
    }
    if nets.is_empty() {
        nets.push(parse_subnet(DEFAULT_SUBNET)?);
    }
    for net in nets.iter() {
        create_subnet_with_ip_pool(api, app_id, net)?;
    }
    Ok(nets)
}

#[derive(Clone, Debug, Default)]
struct NicAddress {
    ip: Option<String>,
    dhcp_reserved: bool,
    ip_config_id: Option<Value>,
}

fn first_hostname(vm: &Value) -> String {
    get(vm, "hostnames.0").ok().and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Wire the ids the service assigned into the network and services.
///
/// Pinned DHCP addresses become reservations on the matching DHCP server,
/// every NIC's ip configuration is registered on its subnet and gets a port
/// on the subnet's switch, and supplied services are bound to the ip
/// configuration of the NIC named by `device`, or carrying `ip`, or else the
/// VM's first NIC.
pub fn update_app_with_internal_luids(api: &dyn RavelloApi, app_id: u64, request: &Value) -> Result<()> {
    let mut app = fetch(api, app_id)?;
    let dhcp_map = create_dhcp_ip_map(&app)?;
    let subnet_map = create_subnet_ip_map(&app)?;

    if let Ok(Value::Array(servers)) = get_mut(&mut app, DHCP_SERVERS) {
        for server in servers.iter_mut() {
            check_for_param(server, "reservedIpEntries", &empty_list())?;
        }
    }

    let mut addresses: IndexMap<String, IndexMap<String, NicAddress>> = IndexMap::new();
    for vm in vms(request) {
        let entry = addresses.entry(first_hostname(vm)).or_default();
        let nics = vm.get("networkConnections").and_then(Value::as_array);
        for nic in nics.into_iter().flatten() {
            let mut address = NicAddress::default();
            if let Some((ip, dhcp_reserved)) = pinned_ip(nic) {
                address.ip = Some(ip);
                address.dhcp_reserved = dhcp_reserved;
            }
            entry.insert(nic_name(nic), address);
        }
    }

    let vm_count = vms(&app).len();
    for i in 0..vm_count {
        let vm_path = Path::parse("design.vms")?.child_index(i);
        let vm = get(&app, &vm_path)?.clone();
        let hostname = first_hostname(&vm);
        let vm_addresses = addresses.entry(hostname.clone()).or_default();

        let nics = vm.get("networkConnections").and_then(Value::as_array).cloned().unwrap_or_default();
        for nic in nics.iter() {
            let ip_config_id = get(nic, "ipConfig.id")?.clone();
            let nic_id = get(nic, "id")?.clone();
            let address = vm_addresses.entry(nic_name(nic)).or_default();
            address.ip_config_id = Some(ip_config_id.clone());

            let (switch, subnet) = match &address.ip {
                Some(ip) => {
                    if address.dhcp_reserved {
                        let dhcp = path_from_ip(&dhcp_map, ip)?;
                        append(&mut app, dhcp.child_key("reservedIpEntries"), json!({"ipConfigurationId": ip_config_id.clone(), "ip": ip}))?;
                    }
                    (switch_path_from_ip(&app, &subnet_map, ip)?, path_from_ip(&subnet_map, ip)?)
                }
                None => (Path::parse(SWITCHES)?.child_index(0), Path::parse(SUBNETS)?.child_index(0)),
            };
            let config_ids = subnet.child_key("ipConfigurationIds");
            check_for_param(&mut app, &config_ids, &empty_list())?;
            append(&mut app, &config_ids, ip_config_id)?;
            create_port_on_switch(&mut app, &switch, nic_id, "VM")?;
        }

        let requested = vms(request)
            .iter()
            .find(|candidate| candidate.get("hostnames") == vm.get("hostnames"))
            .cloned()
            .unwrap_or(Value::Null);
        let service_count = vm.get("suppliedServices").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        for j in 0..service_count {
            let service_request = get(&requested, format!("suppliedServices.{}", j).as_str()).ok();
            let nic = bound_nic(service_request, vm_addresses, &hostname)?;
            let luid = vm_addresses
                .get(&nic)
                .and_then(|a| a.ip_config_id.clone())
                .ok_or_else(|| RavelloError::Module(format!("no NIC {} on {}", nic, hostname)))?;
            let service = vm_path.join(&format!("suppliedServices.{}", j))?;
            set(&mut app, service.child_key("useLuidForIpConfig"), json!(true))?;
            set(&mut app, service.child_key("ipConfigLuid"), luid)?;
        }
    }

    api.update_application(&app)?;
    Ok(())
}

fn bound_nic(service: Option<&Value>, nics: &IndexMap<String, NicAddress>, hostname: &str) -> Result<String> {
    let service = match service {
        Some(service) => service,
        None => return first_nic(nics, hostname),
    };
    if let Some(device) = service.get("device").and_then(Value::as_str) {
        if nics.contains_key(device) {
            return Ok(device.to_string());
        }
        return Err(RavelloError::Module(format!("device {} not found on {}", device, hostname)));
    }
    if let Some(ip) = service.get("ip").and_then(Value::as_str) {
        return nics
            .iter()
            .find(|(_, address)| address.ip.as_deref() == Some(ip))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| RavelloError::Module(format!("ip not found: {} for {}", ip, hostname)));
    }
    first_nic(nics, hostname)
}

fn first_nic(nics: &IndexMap<String, NicAddress>, hostname: &str) -> Result<String> {
    nics.keys()
        .next()
        .cloned()
        .ok_or_else(|| RavelloError::Module(format!("{} has no network connections", hostname)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with_switch() -> Value {
        json!({"design": {"network": {"switches": [
            {"id": 10, "networkSegments": [{"id": 11, "vlanId": 1}]}
        ]}}})
    }

    #[test]
    fn test_plan_subnets_sorts_and_normalizes() {
        let nets = plan_subnets(&[String::from("10.2.0.0/16"), String::from("10.1.7.9/16")]).unwrap();
        let rendered: Vec<String> = nets.iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered, vec!["10.1.0.0/16", "10.2.0.0/16"]);
    }

    #[test]
    fn test_plan_subnets_rejects_overlap() {
        let err = plan_subnets(&[String::from("10.0.0.0/8"), String::from("10.1.0.0/16")]).unwrap_err();
        assert!(err.to_string().starts_with("Overlapping Subnets"));
    }

    #[test]
    fn test_create_port_on_switch() {
        let mut app = app_with_switch();
        let switch = Path::parse("design.network.switches.0").unwrap();
        create_port_on_switch(&mut app, &switch, json!(99), "VM").unwrap();
        create_port_on_switch(&mut app, &switch, json!(100), "SERVICES").unwrap();

        let ports = &app["design"]["network"]["switches"][0]["ports"];
        assert_eq!(ports[0], json!({
            "deviceId": 99,
            "deviceType": "VM",
            "index": 1,
            "networkSegmentReferences": [{"networkSegmentId": 11, "anyNetworkSegment": false, "egressPolicy": "UNTAGGED"}]
        }));
        assert_eq!(ports[1]["index"], json!(2));
        assert_eq!(ports[1]["deviceType"], json!("SERVICES"));
    }

    #[test]
    fn test_ip_maps_and_lookup() {
        let app = json!({"design": {"network": {
            "switches": [
                {"networkSegments": [{"id": 1}]},
                {"networkSegments": [{"id": 2}]}
            ],
            "subnets": [
                {"net": "10.1.0.0", "mask": "255.255.0.0", "networkSegmentId": 1},
                {"net": "172.16.0.0", "mask": "255.255.255.0", "networkSegmentId": 2}
            ],
            "services": {"dhcpServers": [{"poolStart": "172.16.0.0", "mask": "255.255.255.0"}]}
        }}});

        let subnets = create_subnet_ip_map(&app).unwrap();
        assert_eq!(path_from_ip(&subnets, "172.16.0.44").unwrap().to_string(), "design.network.subnets.1");
        assert_eq!(switch_path_from_ip(&app, &subnets, "10.1.3.3").unwrap().to_string(), "design.network.switches.0");
        assert!(path_from_ip(&subnets, "192.168.1.1").is_err());

        let dhcp = create_dhcp_ip_map(&app).unwrap();
        assert_eq!(path_from_ip(&dhcp, "172.16.0.9").unwrap().to_string(), "design.network.services.dhcpServers.0");
    }

    #[test]
    fn test_pinned_ip() {
        assert_eq!(pinned_ip(&json!({"ipConfig": {"autoIpConfig": {"reservedIp": "10.0.0.5"}}})), Some((String::from("10.0.0.5"), true)));
        assert_eq!(pinned_ip(&json!({"ipConfig": {"staticIpConfig": {"ip": "10.0.0.6", "mask": "255.255.0.0"}}})), Some((String::from("10.0.0.6"), false)));
        assert_eq!(pinned_ip(&json!({"ipConfig": {"autoIpConfig": {}}})), None);
    }

    #[test]
    fn test_bound_nic_order() {
        let mut nics = IndexMap::new();
        nics.insert(String::from("eth0"), NicAddress { ip: Some(String::from("10.0.0.5")), ..NicAddress::default() });
        nics.insert(String::from("eth1"), NicAddress { ip: Some(String::from("10.0.0.6")), ..NicAddress::default() });

        assert_eq!(bound_nic(Some(&json!({"device": "eth1"})), &nics, "web").unwrap(), "eth1");
        assert_eq!(bound_nic(Some(&json!({"ip": "10.0.0.6"})), &nics, "web").unwrap(), "eth1");
        assert_eq!(bound_nic(Some(&json!({"name": "ssh"})), &nics, "web").unwrap(), "eth0");
        assert!(bound_nic(Some(&json!({"ip": "10.9.9.9"})), &nics, "web").is_err());
        assert!(bound_nic(Some(&json!({"device": "eth7"})), &nics, "web").is_err());
    }
}
