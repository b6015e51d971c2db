/// Known brand: catalogue key, display name, category hint and the aliases
/// that may prefix a model name in running text.
#[derive(Debug, Clone, Copy)]
pub struct BrandEntry {
    pub key: &'static str,
    pub display: &'static str,
    pub category: &'static str,
    pub aliases: &'static [&'static str],
}

/// Self-identifying product line that needs no brand prefix
#[derive(Debug, Clone, Copy)]
pub struct StandalonePattern {
    pub pattern: &'static str,
    pub category: &'static str,
    pub brand: Option<&'static str>,
}

pub const BRANDS: &[BrandEntry] = &[
    BrandEntry { key: "apple", display: "Apple", category: "Electronics", aliases: &["Apple"] },
    BrandEntry { key: "samsung", display: "Samsung", category: "Electronics", aliases: &["Samsung"] },
    BrandEntry { key: "sony", display: "Sony", category: "Electronics", aliases: &["Sony"] },
    BrandEntry { key: "bose", display: "Bose", category: "Audio", aliases: &["Bose"] },
    BrandEntry { key: "sennheiser", display: "Sennheiser", category: "Audio", aliases: &["Sennheiser"] },
    BrandEntry { key: "jbl", display: "JBL", category: "Audio", aliases: &["JBL"] },
    BrandEntry { key: "anker", display: "Anker", category: "Electronics", aliases: &["Anker", "Soundcore"] },
    BrandEntry { key: "amazon", display: "Amazon", category: "Electronics", aliases: &["Amazon"] },
    BrandEntry { key: "google", display: "Google", category: "Electronics", aliases: &["Google"] },
    BrandEntry { key: "microsoft", display: "Microsoft", category: "Electronics", aliases: &["Microsoft"] },
    BrandEntry { key: "dell", display: "Dell", category: "Computers", aliases: &["Dell", "Alienware"] },
    BrandEntry { key: "hp", display: "HP", category: "Computers", aliases: &["HP", "Hewlett-Packard"] },
    BrandEntry { key: "lenovo", display: "Lenovo", category: "Computers", aliases: &["Lenovo"] },
    BrandEntry { key: "asus", display: "ASUS", category: "Computers", aliases: &["ASUS", "Asus", "ROG"] },
    BrandEntry { key: "acer", display: "Acer", category: "Computers", aliases: &["Acer"] },
    BrandEntry { key: "logitech", display: "Logitech", category: "Computer Accessories", aliases: &["Logitech", "Logi"] },
    BrandEntry { key: "razer", display: "Razer", category: "Gaming", aliases: &["Razer"] },
    BrandEntry { key: "corsair", display: "Corsair", category: "Gaming", aliases: &["Corsair"] },
    BrandEntry { key: "nintendo", display: "Nintendo", category: "Gaming", aliases: &["Nintendo"] },
    BrandEntry { key: "lg", display: "LG", category: "Electronics", aliases: &["LG"] },
    BrandEntry { key: "tcl", display: "TCL", category: "Electronics", aliases: &["TCL"] },
    BrandEntry { key: "canon", display: "Canon", category: "Cameras", aliases: &["Canon"] },
    BrandEntry { key: "nikon", display: "Nikon", category: "Cameras", aliases: &["Nikon"] },
    BrandEntry { key: "fujifilm", display: "Fujifilm", category: "Cameras", aliases: &["Fujifilm", "Fuji"] },
    BrandEntry { key: "dji", display: "DJI", category: "Cameras", aliases: &["DJI"] },
    BrandEntry { key: "gopro", display: "GoPro", category: "Cameras", aliases: &["GoPro"] },
    BrandEntry { key: "garmin", display: "Garmin", category: "Wearables", aliases: &["Garmin"] },
    BrandEntry { key: "fitbit", display: "Fitbit", category: "Wearables", aliases: &["Fitbit"] },
    BrandEntry { key: "oura", display: "Oura", category: "Wearables", aliases: &["Oura"] },
    BrandEntry { key: "dyson", display: "Dyson", category: "Home Appliances", aliases: &["Dyson"] },
    BrandEntry { key: "shark", display: "Shark", category: "Home Appliances", aliases: &["Shark"] },
    BrandEntry { key: "irobot", display: "iRobot", category: "Home Appliances", aliases: &["iRobot"] },
    BrandEntry { key: "philips", display: "Philips", category: "Home Appliances", aliases: &["Philips"] },
    BrandEntry { key: "panasonic", display: "Panasonic", category: "Home Appliances", aliases: &["Panasonic"] },
    BrandEntry { key: "kitchenaid", display: "KitchenAid", category: "Kitchen", aliases: &["KitchenAid"] },
    BrandEntry { key: "breville", display: "Breville", category: "Kitchen", aliases: &["Breville"] },
    BrandEntry { key: "cuisinart", display: "Cuisinart", category: "Kitchen", aliases: &["Cuisinart"] },
    BrandEntry { key: "vitamix", display: "Vitamix", category: "Kitchen", aliases: &["Vitamix"] },
    BrandEntry { key: "ninja", display: "Ninja", category: "Kitchen", aliases: &["Ninja"] },
    BrandEntry { key: "keurig", display: "Keurig", category: "Kitchen", aliases: &["Keurig"] },
    BrandEntry { key: "nespresso", display: "Nespresso", category: "Kitchen", aliases: &["Nespresso"] },
    BrandEntry { key: "instant", display: "Instant Brands", category: "Kitchen", aliases: &["Instant Pot"] },
    BrandEntry { key: "weber", display: "Weber", category: "Outdoor", aliases: &["Weber"] },
    BrandEntry { key: "yeti", display: "YETI", category: "Outdoor", aliases: &["YETI", "Yeti"] },
    BrandEntry { key: "nike", display: "Nike", category: "Apparel", aliases: &["Nike"] },
    BrandEntry { key: "adidas", display: "Adidas", category: "Apparel", aliases: &["Adidas", "adidas"] },
    BrandEntry { key: "therabody", display: "Therabody", category: "Health", aliases: &["Therabody", "Theragun"] },
    BrandEntry { key: "oneplus", display: "OnePlus", category: "Electronics", aliases: &["OnePlus"] },
    BrandEntry { key: "xiaomi", display: "Xiaomi", category: "Electronics", aliases: &["Xiaomi", "Redmi"] },
];

pub const STANDALONE_PATTERNS: &[StandalonePattern] = &[
    StandalonePattern {
        pattern: r"\biPhone\s?\d{1,2}(?:\s?(?:Pro\s?Max|Pro|Plus|Mini|mini|e))?\b",
        category: "Electronics",
        brand: Some("Apple"),
    },
    StandalonePattern {
        pattern: r"\biPad(?:\s?(?:Pro|Air|mini|Mini))?(?:\s?\d{1,2}(?:th)?)?\b",
        category: "Electronics",
        brand: Some("Apple"),
    },
    StandalonePattern {
        pattern: r"\bMacBook\s?(?:Air|Pro)(?:\s?M\d(?:\s?(?:Pro|Max))?)?(?:\s?\d{2}(?:-inch)?)?\b",
        category: "Computers",
        brand: Some("Apple"),
    },
    StandalonePattern {
        pattern: r"\bAirPods(?:\s?(?:Pro|Max))?(?:\s?\d)?\b",
        category: "Audio",
        brand: Some("Apple"),
    },
    StandalonePattern {
        pattern: r"\bApple Watch(?:\s?(?:Series\s?\d{1,2}|Ultra(?:\s?\d)?|SE))?\b",
        category: "Wearables",
        brand: Some("Apple"),
    },
    StandalonePattern {
        pattern: r"\bGalaxy\s?(?:S|Z\s?(?:Fold|Flip)|Tab\s?S|A|Note|Buds|Watch)\s?\d{1,2}(?:\s?(?:Ultra|Plus|FE|Pro))?\b",
        category: "Electronics",
        brand: Some("Samsung"),
    },
    StandalonePattern {
        pattern: r"\bPixel\s?\d{1,2}(?:\s?(?:Pro(?:\s?XL)?|a|XL))?\b",
        category: "Electronics",
        brand: Some("Google"),
    },
    StandalonePattern {
        pattern: r"\bKindle(?:\s?(?:Paperwhite|Oasis|Scribe|Colorsoft))?\b",
        category: "Electronics",
        brand: Some("Amazon"),
    },
    StandalonePattern {
        pattern: r"\bEcho\s?(?:Dot|Show|Studio|Pop)(?:\s?\d{1,2})?\b",
        category: "Smart Home",
        brand: Some("Amazon"),
    },
    StandalonePattern {
        pattern: r"\bFire TV Stick(?:\s?4K(?:\s?Max)?)?\b",
        category: "Electronics",
        brand: Some("Amazon"),
    },
    StandalonePattern {
        pattern: r"\bPlayStation\s?\d(?:\s?(?:Pro|Slim))?\b",
        category: "Gaming",
        brand: Some("Sony"),
    },
    StandalonePattern {
        pattern: r"\bNintendo Switch(?:\s?(?:OLED|Lite|2))?\b",
        category: "Gaming",
        brand: Some("Nintendo"),
    },
    StandalonePattern {
        pattern: r"\bXbox Series [XS]\b",
        category: "Gaming",
        brand: Some("Microsoft"),
    },
    StandalonePattern {
        pattern: r"\bSurface\s?(?:Pro|Laptop|Go|Book)(?:\s?\d{1,2})?\b",
        category: "Computers",
        brand: Some("Microsoft"),
    },
    StandalonePattern {
        pattern: r"\bThinkPad\s?[A-Z]\d{1,3}\w*\b",
        category: "Computers",
        brand: Some("Lenovo"),
    },
    StandalonePattern {
        pattern: r"\bGoPro\s?HERO\s?\d{1,2}(?:\s?Black)?\b",
        category: "Cameras",
        brand: Some("GoPro"),
    },
    StandalonePattern {
        pattern: r"\bRoomba\s?(?:Combo\s?)?[a-z]?\d{1,4}\+?",
        category: "Home Appliances",
        brand: Some("iRobot"),
    },
    StandalonePattern {
        pattern: r"\bInstant Pot(?:\s?(?:Duo|Pro|Ultra|Max)(?:\s?(?:Plus|Crisp|Evo))?)?\b",
        category: "Kitchen",
        brand: Some("Instant Brands"),
    },
    StandalonePattern {
        pattern: r"\bOura Ring(?:\s?(?:Gen\s?)?\d)?\b",
        category: "Wearables",
        brand: Some("Oura"),
    },
];

/// Lookup view over the brand table
#[derive(Debug, Clone, Copy, Default)]
pub struct BrandCatalog;

impl BrandCatalog {
    /// Resolve a brand string (key, display name or alias) case-insensitively
    pub fn resolve(&self, brand: &str) -> Option<&'static BrandEntry> {
        let wanted = brand.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        BRANDS.iter().find(|entry| {
            entry.key == wanted
                || entry.display.to_lowercase() == wanted
                || entry.aliases.iter().any(|alias| alias.to_lowercase() == wanted)
        })
    }

    /// First known brand appearing as a whole word in `text`
    pub fn find_in_text(&self, text: &str) -> Option<&'static BrandEntry> {
        text.split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|word| !word.is_empty())
            .find_map(|word| self.resolve(word))
    }

    pub fn is_known(&self, brand: &str) -> bool {
        self.resolve(brand).is_some()
    }
}
