use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Pace SNMP requests towards a UDP endpoint
    Snmp(SnmpArgs),
    /// Pace raw TLS record frames onto a network interface
    Tls(TlsArgs),
}

#[derive(Debug, ClapArgs, Clone)]
#[command(group(
    ArgGroup::new("bound")
        .required(true)
        .multiple(true)
        .args(["duration", "count"]),
))]
#[command(group(
    ArgGroup::new("requests")
        .required(true)
        .multiple(true)
        .args(["get", "getnext", "set", "trap", "getbulk", "inform", "report"]),
))]
pub struct SnmpArgs {
    #[arg(long, default_value = "127.0.0.1", help = "Destination IP")]
    pub dest: String,
    #[arg(long, default_value_t = 161, help = "Destination port")]
    pub port: u16,
    #[arg(short, long, default_value_t = 10.0, help = "Target rate in kbps")]
    pub rate: f64,
    #[arg(short, long, value_parser = humantime::parse_duration, help = "Sending duration, such as \"10s\"")]
    pub duration: Option<Duration>,
    #[arg(short, long, help = "Number of packets to send")]
    pub count: Option<u64>,
    #[arg(short, long, help = "Seed for random number generation")]
    pub seed: Option<u64>,

    #[arg(
        long,
        default_value = "2c",
        help = "SNMP version: v1, 2c or v3. Anything else sends corrupted v2c packets"
    )]
    pub version: String,
    #[arg(long, default_value = "public", help = "SNMP community string")]
    pub community: String,
    #[arg(long, default_value = "snmpuser", help = "SNMPv3 username")]
    pub v3_user: String,
    #[arg(
        long,
        default_value = "noAuthNoPriv",
        help = "SNMPv3 security level: noAuthNoPriv, authNoPriv or authPriv"
    )]
    pub v3_sec_level: String,
    #[arg(long, default_value = "", help = "SNMPv3 auth protocol: MD5 or SHA")]
    pub v3_auth_proto: String,
    #[arg(long, default_value = "", help = "SNMPv3 auth passphrase")]
    pub v3_auth_pass: String,
    #[arg(long, default_value = "", help = "SNMPv3 privacy protocol: DES or AES")]
    pub v3_priv_proto: String,
    #[arg(long, default_value = "", help = "SNMPv3 privacy passphrase")]
    pub v3_priv_pass: String,

    #[arg(long, help = "Send GET requests")]
    pub get: bool,
    #[arg(long, help = "Send GETNEXT requests")]
    pub getnext: bool,
    #[arg(long, help = "Send SET requests")]
    pub set: bool,
    #[arg(long, help = "Send traps")]
    pub trap: bool,
    #[arg(long, help = "Send GETBULK requests")]
    pub getbulk: bool,
    #[arg(long, help = "Send INFORM requests")]
    pub inform: bool,
    #[arg(long, help = "Send REPORT messages")]
    pub report: bool,
}

#[derive(Debug, ClapArgs, Clone)]
#[command(group(
    ArgGroup::new("bound")
        .required(true)
        .multiple(true)
        .args(["duration", "count"]),
))]
pub struct TlsArgs {
    #[arg(long, default_value = "127.0.0.1", help = "Destination IPv4 address")]
    pub dest: String,
    #[arg(long, default_value_t = 443, help = "Destination port")]
    pub port: u16,
    #[arg(short, long, default_value_t = 10.0, help = "Target rate in kbps")]
    pub rate: f64,
    #[arg(short, long, value_parser = humantime::parse_duration, help = "Sending duration, such as \"10s\"")]
    pub duration: Option<Duration>,
    #[arg(short, long, help = "Number of packets to send")]
    pub count: Option<u64>,

    #[arg(
        short,
        long,
        required = true,
        value_delimiter = ',',
        help = "TLS record content types to send, such as \"22,23\""
    )]
    pub types: Vec<u8>,
    #[arg(short, long, default_value = "lo", help = "Interface to inject on")]
    pub iface: String,
}
