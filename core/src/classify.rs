//! Page and device classification.
//!
//! Report code asks a [`PageClassifier`] for the coarse category of a URL and a
//! [`DeviceClassifier`] for the profile of a `deviceInfo` blob. The shipped
//! rules live in [`HeuristicClassifier`]; swapping rules means providing another
//! implementation, not touching aggregation code.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Coarse page category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PageCategory {
    /// `/`
    Homepage,
    /// Product detail.
    Product,
    /// Category or collection listing.
    Category,
    /// Search results.
    Search,
    /// Shopping cart.
    Cart,
    /// Checkout flow.
    Checkout,
    /// Account, profile, login, orders.
    Account,
    /// PC configurator.
    PcBuilder,
    /// Anything else.
    Other,
}

impl PageCategory {
    /// Label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Homepage => "Homepage",
            Self::Product => "Product",
            Self::Category => "Category",
            Self::Search => "Search",
            Self::Cart => "Cart",
            Self::Checkout => "Checkout",
            Self::Account => "Account",
            Self::PcBuilder => "PC Builder",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Form factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceType {
    /// Desktop or laptop.
    Desktop,
    /// Phone.
    Mobile,
    /// Tablet.
    Tablet,
    /// Not enough information.
    Unknown,
}

impl DeviceType {
    /// Label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
            Self::Unknown => "Unknown",
        }
    }
}

/// Operating system family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OperatingSystem {
    /// Microsoft Windows.
    Windows,
    /// iPhone / iPad.
    Ios,
    /// Android.
    Android,
    /// macOS.
    MacOs,
    /// ChromeOS.
    ChromeOs,
    /// Desktop Linux.
    Linux,
    /// Anything else.
    Other,
}

impl OperatingSystem {
    /// Label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::MacOs => "macOS",
            Self::ChromeOs => "ChromeOS",
            Self::Linux => "Linux",
            Self::Other => "Other",
        }
    }
}

/// Browser family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Browser {
    /// Microsoft Edge.
    Edge,
    /// Opera.
    Opera,
    /// Samsung Internet.
    SamsungInternet,
    /// Cốc Cốc.
    CocCoc,
    /// Firefox.
    Firefox,
    /// Chrome and Chromium.
    Chrome,
    /// Safari.
    Safari,
    /// Anything else.
    Other,
}

impl Browser {
    /// Label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edge => "Edge",
            Self::Opera => "Opera",
            Self::SamsungInternet => "Samsung Internet",
            Self::CocCoc => "Cốc Cốc",
            Self::Firefox => "Firefox",
            Self::Chrome => "Chrome",
            Self::Safari => "Safari",
            Self::Other => "Other",
        }
    }
}

/// Classified `deviceInfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceProfile {
    /// Form factor.
    pub device_type: DeviceType,
    /// OS family.
    pub os: OperatingSystem,
    /// Browser family.
    pub browser: Browser,
}

/// Maps a page URL to a [`PageCategory`].
pub trait PageClassifier: Send + Sync {
    /// Category of `url`; `None` or blank is [`PageCategory::Other`].
    fn classify_page(&self, url: Option<&str>) -> PageCategory;
}

/// Maps a `deviceInfo` blob to a [`DeviceProfile`].
pub trait DeviceClassifier: Send + Sync {
    /// Profile of `device_info`.
    fn classify_device(&self, device_info: Option<&Value>) -> DeviceProfile;
}

/// Substring rules over URL paths and user agents.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Mobile/tablet cut-offs in CSS pixels when the user agent says nothing.
    const MOBILE_MAX_WIDTH: u64 = 767;
    const TABLET_MAX_WIDTH: u64 = 1024;

    fn device_type(user_agent: &str, width: Option<u64>) -> DeviceType {
        if user_agent.contains("ipad")
            || user_agent.contains("tablet")
            || (user_agent.contains("android") && !user_agent.contains("mobile"))
        {
            return DeviceType::Tablet;
        }
        if user_agent.contains("mobi")
            || user_agent.contains("iphone")
            || user_agent.contains("ipod")
            || user_agent.contains("windows phone")
        {
            return DeviceType::Mobile;
        }
        if user_agent.contains("windows")
            || user_agent.contains("macintosh")
            || user_agent.contains("x11")
            || user_agent.contains("cros")
            || user_agent.contains("linux")
        {
            return DeviceType::Desktop;
        }
        match width {
            Some(w) if w == 0 => DeviceType::Unknown,
            Some(w) if w <= Self::MOBILE_MAX_WIDTH => DeviceType::Mobile,
            Some(w) if w <= Self::TABLET_MAX_WIDTH => DeviceType::Tablet,
            Some(_) => DeviceType::Desktop,
            None => DeviceType::Unknown,
        }
    }

    fn os(user_agent: &str) -> OperatingSystem {
        if user_agent.contains("windows") {
            OperatingSystem::Windows
        } else if user_agent.contains("iphone")
            || user_agent.contains("ipad")
            || user_agent.contains("ipod")
        {
            OperatingSystem::Ios
        } else if user_agent.contains("android") {
            OperatingSystem::Android
        } else if user_agent.contains("mac os") || user_agent.contains("macintosh") {
            OperatingSystem::MacOs
        } else if user_agent.contains("cros") {
            OperatingSystem::ChromeOs
        } else if user_agent.contains("linux") || user_agent.contains("x11") {
            OperatingSystem::Linux
        } else {
            OperatingSystem::Other
        }
    }

    // Order matters: Edge, Opera and friends also claim to be Chrome and Safari.
    fn browser(user_agent: &str) -> Browser {
        if user_agent.contains("edg/") || user_agent.contains("edge") {
            Browser::Edge
        } else if user_agent.contains("opr/") || user_agent.contains("opera") {
            Browser::Opera
        } else if user_agent.contains("samsungbrowser") {
            Browser::SamsungInternet
        } else if user_agent.contains("coc_coc") || user_agent.contains("coccoc") {
            Browser::CocCoc
        } else if user_agent.contains("firefox") || user_agent.contains("fxios") {
            Browser::Firefox
        } else if user_agent.contains("chrome")
            || user_agent.contains("crios")
            || user_agent.contains("chromium")
        {
            Browser::Chrome
        } else if user_agent.contains("safari") {
            Browser::Safari
        } else {
            Browser::Other
        }
    }
}

impl PageClassifier for HeuristicClassifier {
    fn classify_page(&self, url: Option<&str>) -> PageCategory {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return PageCategory::Other;
        };
        let url = url.to_lowercase();
        let path = strip_origin(&url);
        let (path_only, query) = path.split_once('?').unwrap_or((path, ""));
        let path_only = path_only.split('#').next().unwrap_or_default();

        if path_only.is_empty() || path_only == "/" {
            if query.contains("q=") {
                return PageCategory::Search;
            }
            return PageCategory::Homepage;
        }
        if path_only.contains("checkout") {
            PageCategory::Checkout
        } else if path_only.contains("cart") {
            PageCategory::Cart
        } else if path_only.contains("build-pc")
            || path_only.contains("pc-builder")
            || path_only.contains("build_pc")
        {
            PageCategory::PcBuilder
        } else if path_only.contains("product") {
            PageCategory::Product
        } else if path_only.contains("categor") || path_only.contains("collections") {
            PageCategory::Category
        } else if path_only.contains("search") || query.contains("q=") {
            PageCategory::Search
        } else if ["account", "profile", "login", "register", "orders"]
            .iter()
            .any(|segment| path_only.contains(segment))
        {
            PageCategory::Account
        } else {
            PageCategory::Other
        }
    }
}

impl DeviceClassifier for HeuristicClassifier {
    fn classify_device(&self, device_info: Option<&Value>) -> DeviceProfile {
        let user_agent = device_info
            .and_then(|info| info.get("userAgent").or_else(|| info.get("user_agent")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let width = device_info.and_then(screen_width);

        DeviceProfile {
            device_type: Self::device_type(&user_agent, width),
            os: Self::os(&user_agent),
            browser: Self::browser(&user_agent),
        }
    }
}

fn strip_origin(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => url,
    }
}

fn screen_width(info: &Value) -> Option<u64> {
    let width = |value: &Value| -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64(),
            // "1920x1080"
            Value::String(s) => s.split(['x', 'X']).next()?.trim().parse().ok(),
            Value::Object(o) => o.get("width").and_then(Value::as_u64),
            _ => None,
        }
    };
    ["viewportWidth", "screenWidth", "viewport", "screenSize", "screen"]
        .iter()
        .find_map(|key| info.get(*key).and_then(width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const WINDOWS_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const COC_COC: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) coc_coc_browser/117.0.196 Chrome/111.0.0.0 Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/21.0 Chrome/110.0.0.0 Safari/537.36";

    #[test]
    fn pages_classify_by_path() {
        let c = HeuristicClassifier;
        assert_eq!(c.classify_page(Some("https://shop.vn/")), PageCategory::Homepage);
        assert_eq!(c.classify_page(Some("https://shop.vn")), PageCategory::Homepage);
        assert_eq!(c.classify_page(Some("/products/rtx-4070")), PageCategory::Product);
        assert_eq!(c.classify_page(Some("/categories/gpu")), PageCategory::Category);
        assert_eq!(c.classify_page(Some("/search?q=ssd")), PageCategory::Search);
        assert_eq!(c.classify_page(Some("/?q=ssd")), PageCategory::Search);
        assert_eq!(c.classify_page(Some("/cart")), PageCategory::Cart);
        assert_eq!(c.classify_page(Some("/cart/checkout")), PageCategory::Checkout);
        assert_eq!(c.classify_page(Some("/build-pc")), PageCategory::PcBuilder);
        assert_eq!(c.classify_page(Some("/account/orders")), PageCategory::Account);
        assert_eq!(c.classify_page(Some("/about-us")), PageCategory::Other);
        assert_eq!(c.classify_page(None), PageCategory::Other);
    }

    #[test]
    fn devices_classify_by_user_agent() {
        let c = HeuristicClassifier;

        let iphone = c.classify_device(Some(&json!({ "userAgent": IPHONE })));
        assert_eq!(iphone.device_type, DeviceType::Mobile);
        assert_eq!(iphone.os, OperatingSystem::Ios);
        assert_eq!(iphone.browser, Browser::Safari);

        let edge = c.classify_device(Some(&json!({ "userAgent": WINDOWS_EDGE })));
        assert_eq!(edge.device_type, DeviceType::Desktop);
        assert_eq!(edge.os, OperatingSystem::Windows);
        assert_eq!(edge.browser, Browser::Edge);

        let coc_coc = c.classify_device(Some(&json!({ "userAgent": COC_COC })));
        assert_eq!(coc_coc.browser, Browser::CocCoc);

        let tablet = c.classify_device(Some(&json!({ "userAgent": ANDROID_TABLET })));
        assert_eq!(tablet.device_type, DeviceType::Tablet);
        assert_eq!(tablet.os, OperatingSystem::Android);
        assert_eq!(tablet.browser, Browser::SamsungInternet);
    }

    #[test]
    fn screen_width_is_the_fallback() {
        let c = HeuristicClassifier;
        let narrow = c.classify_device(Some(&json!({ "screenSize": "390x844" })));
        assert_eq!(narrow.device_type, DeviceType::Mobile);

        let wide = c.classify_device(Some(&json!({ "viewport": { "width": 1440, "height": 900 } })));
        assert_eq!(wide.device_type, DeviceType::Desktop);

        let unknown = c.classify_device(None);
        assert_eq!(unknown.device_type, DeviceType::Unknown);
        assert_eq!(unknown.browser, Browser::Other);
    }
}
