use std::cmp::Ordering;

/// Dynamic revision labels that must be turned into a concrete revision before use.
pub const LATEST_LABELS: [&str; 3] = ["latest", "latest.integration", "latest.release"];

/// A module revision with Maven-style ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub original: String,
    parsed: ParsedRevision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedRevision {
    Semantic(semver::Version),
    Items(Vec<Item>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(u64),
    Qualifier(String),
}

impl Revision {
    pub fn parse(revision: &str) -> Self {
        let parsed = match semver::Version::parse(revision) {
            Ok(v) => ParsedRevision::Semantic(v),
            Err(_) => ParsedRevision::Items(tokenize(revision)),
        };
        Self {
            original: revision.to_string(),
            parsed,
        }
    }

    /// False for snapshots, milestones, release candidates and other pre-releases.
    pub fn is_release(&self) -> bool {
        match &self.parsed {
            ParsedRevision::Semantic(v) => v.pre.is_empty() && !is_unstable_text(&self.original),
            ParsedRevision::Items(items) => items.iter().all(|item| match item {
                Item::Number(_) => true,
                Item::Qualifier(q) => qualifier_rank(q) >= RELEASE_RANK,
            }),
        }
    }

    fn items(&self) -> Vec<Item> {
        match &self.parsed {
            ParsedRevision::Items(items) => items.clone(),
            ParsedRevision::Semantic(_) => tokenize(&self.original),
        }
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (ParsedRevision::Semantic(a), ParsedRevision::Semantic(b)) =
            (&self.parsed, &other.parsed)
        {
            return a.cmp(b).then_with(|| self.original.cmp(&other.original));
        }
        compare_items(&self.items(), &other.items())
            .then_with(|| self.original.cmp(&other.original))
    }
}

const RELEASE_RANK: u8 = 5;

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" | "a" | "dev" | "eap" | "preview" | "canary" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 6,
        _ => 7,
    }
}

fn is_unstable_text(revision: &str) -> bool {
    let lower = revision.to_ascii_lowercase();
    ["snapshot", "alpha", "beta", "-rc", ".rc", "-m", "preview"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn tokenize(revision: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut digits = false;

    let flush = |current: &mut String, digits: bool, items: &mut Vec<Item>| {
        if current.is_empty() {
            return;
        }
        let item = if digits {
            current
                .parse()
                .map(Item::Number)
                .unwrap_or_else(|_| Item::Qualifier(current.clone()))
        } else {
            Item::Qualifier(current.to_ascii_lowercase())
        };
        items.push(item);
        current.clear();
    };

    for ch in revision.chars() {
        if ch == '.' || ch == '-' || ch == '_' || ch == '+' {
            flush(&mut current, digits, &mut items);
            continue;
        }
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != digits {
            flush(&mut current, digits, &mut items);
        }
        digits = is_digit;
        current.push(ch);
    }
    flush(&mut current, digits, &mut items);
    items
}

fn compare_items(a: &[Item], b: &[Item]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ordering = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => compare_item(x, y),
            (Some(x), None) => compare_to_missing(x),
            (None, Some(y)) => compare_to_missing(y).reverse(),
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_item(a: &Item, b: &Item) -> Ordering {
    match (a, b) {
        (Item::Number(x), Item::Number(y)) => x.cmp(y),
        (Item::Number(_), Item::Qualifier(_)) => Ordering::Greater,
        (Item::Qualifier(_), Item::Number(_)) => Ordering::Less,
        (Item::Qualifier(x), Item::Qualifier(y)) => qualifier_rank(x)
            .cmp(&qualifier_rank(y))
            .then_with(|| x.cmp(y)),
    }
}

// A missing trailing item behaves like `0` or like a release qualifier.
fn compare_to_missing(item: &Item) -> Ordering {
    match item {
        Item::Number(n) => n.cmp(&0),
        Item::Qualifier(q) => qualifier_rank(q).cmp(&RELEASE_RANK),
    }
}

/// True when `candidate` orders after `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    Revision::parse(candidate) > Revision::parse(current)
}

/// Newest revision in `revisions`, optionally ignoring pre-releases.
pub fn latest<S: AsRef<str>>(revisions: &[S], release_only: bool) -> Option<String> {
    revisions
        .iter()
        .map(|r| Revision::parse(r.as_ref()))
        .filter(|r| !release_only || r.is_release())
        .max()
        .map(|r| r.original)
}

/// Whether `revision` is one of the dynamic `latest` labels.
pub fn is_dynamic(revision: &str) -> bool {
    LATEST_LABELS.contains(&revision)
}
