use url::Url;
use std::{net::SocketAddr, path::PathBuf, time};
use crate::ResolverError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DEFAULT_LB_BASE_URL: &str = "https://api.listenbrainz.org/1/";
pub const DEFAULT_MB_BASE_URL: &str = "https://musicbrainz.org/ws/2/";
pub const DEFAULT_CACHE_NAMESPACE: &str = "https://nowplaying-resolver.cache/";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Reads an optional variable, treating blank values as unset
fn env_opt(s: &str) -> Option<String> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

/// Url::join drops the last path segment unless the base ends with '/'
fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_base(var: &str, default: &str) -> Result<Url, ResolverError> {
    let raw = env_opt(var).unwrap_or_else(|| default.to_string());
    let mut url = Url::parse(&raw)
        .map_err(|e| ResolverError::Config(format!("{var} invalid {e}")))?;
    ensure_https(&url).map_err(ResolverError::Config)?;
    ensure_trailing_slash(&mut url);
    Ok(url)
}

/// Identity expected by both services in the User-Agent header
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub user_agent: String,
}

/// MusicBrainz asks callers to identify their own application
fn default_contact() -> String {
    format!("( {} )", env!("CARGO_PKG_REPOSITORY"))
}

fn build_identity() -> IdentityConfig {
    let application = env_opt("APPLICATION").unwrap_or_else(|| {
        format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    });
    let contact = env_opt("USER_AGENT_CONTACT")
        .unwrap_or_else(default_contact);
    IdentityConfig { user_agent: format!("{application} {contact}") }
}

#[derive(Debug, Clone)]
pub struct ListenBrainzConfig {
    pub base_url: Url,  // https://api.listenbrainz.org/1/
}

fn build_listenbrainz() -> Result<ListenBrainzConfig, ResolverError> {
    let base_url = parse_base("LB_BASE_URL", DEFAULT_LB_BASE_URL)?;
    Ok( ListenBrainzConfig { base_url } )
}

///
/// Configuration for musicbrainz api
///
#[derive(Debug, Clone)]
pub struct MusicBrainzConfig {
    pub base_url: Url,  // https://musicbrainz.org/ws/2/
    pub max_rps: f32,   // default 1.0, 0 disables the gate
}

impl MusicBrainzConfig {
    /// Spacing between MusicBrainz requests. Rates too small to express
    /// as a `Duration` saturate rather than panic.
    pub fn min_interval(&self) -> time::Duration {
        if self.max_rps > 0.0 {
            time::Duration::try_from_secs_f32(1.0 / self.max_rps)
                .unwrap_or(time::Duration::MAX)
        } else {
            time::Duration::ZERO
        }
    }
}

/// Zero, or a finite positive rate whose interval fits a `Duration`
fn max_rps_valid(v: f32) -> bool {
    v == 0.0
        || (v.is_finite() && v > 0.0 && time::Duration::try_from_secs_f32(1.0 / v).is_ok())
}

fn build_musicbrainz() -> Result<MusicBrainzConfig, ResolverError> {
    let base_url = parse_base("MB_BASE_URL", DEFAULT_MB_BASE_URL)?;
    ensure_host(&base_url, "musicbrainz.org")
        .map_err(ResolverError::Config)?;

    let max_rps = match env_opt("MB_MAX_RPS") {
        Some(s) => s.parse::<f32>()
            .ok()
            .filter(|v| max_rps_valid(*v))
            .ok_or_else(|| ResolverError::Config(format!("MB_MAX_RPS invalid: {s}")))?,
        None => 1.0
    };

    Ok( MusicBrainzConfig { base_url, max_rps } )
}

///
/// Configuration for Http timeouts, pool, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for the response cache
///
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,       // prefix of synthetic reconciliation keys
    pub dir: Option<PathBuf>,    // on-disk entries when set, memory otherwise
    pub zstd_level: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            dir: None,
            zstd_level: 3,
        }
    }
}

fn build_cache() -> Result<CacheConfig, ResolverError> {
    let namespace = env_opt("CACHE_NAMESPACE")
        .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_string());
    let mut namespace = Url::parse(&namespace)
        .map_err(|e| ResolverError::Config(format!("CACHE_NAMESPACE invalid {e}")))?;
    ensure_trailing_slash(&mut namespace);
    let namespace = namespace.to_string();

    let dir = env_opt("CACHE_DIR").map(PathBuf::from);
    let zstd_level = match env_opt("CACHE_ZSTD_LEVEL") {
        Some(s) => s.parse::<i32>()
            .map_err(|e| ResolverError::Config(format!("CACHE_ZSTD_LEVEL invalid {e}")))?,
        None => 3
    };

    Ok( CacheConfig { namespace, dir, zstd_level } )
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

fn build_server() -> Result<ServerConfig, ResolverError> {
    let raw = env_opt("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let bind_addr = raw.parse::<SocketAddr>()
        .map_err(|e| ResolverError::Config(format!("BIND_ADDR invalid {e}")))?;
    Ok( ServerConfig { bind_addr } )
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,nowplaying_resolver=debug,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging() -> Result<LoggingConfig, ResolverError> {
    let mut logging = LoggingConfig::default();
    if let Some(s) = env_opt("LOG_FORMAT") {
        logging.format = LogFormat::parse(&s)
            .ok_or_else(|| ResolverError::Config(format!("LOG_FORMAT invalid: {s}")))?;
    }
    if logging.format == LogFormat::Pretty {
        logging.include_file_line = false;
    }
    Ok(logging)
}

///
/// AppConfig which holds everything the resolver and server need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub listenbrainz: ListenBrainzConfig,
    pub musicbrainz: MusicBrainzConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ResolverError> {
    dotenvy::dotenv().ok();

    let identity     = build_identity();
    let listenbrainz = build_listenbrainz()?;
    let musicbrainz  = build_musicbrainz()?;
    let http         = HttpConfig::default();
    let cache        = build_cache()?;
    let server       = build_server()?;
    let logging      = build_logging()?;

    Ok( AppConfig {
        identity, listenbrainz, musicbrainz, http, cache, server, logging
    } )
}
