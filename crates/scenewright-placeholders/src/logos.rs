//! Team logo lookup for `{{LOGO:league:team}}`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum League {
    Nfl,
    Nba,
    Mlb,
    Nhl,
}

impl League {
    pub fn parse(s: &str) -> Option<League> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nfl" | "football" | "american football" => Some(League::Nfl),
            "nba" | "basketball" => Some(League::Nba),
            "mlb" | "baseball" => Some(League::Mlb),
            "nhl" | "hockey" | "ice hockey" => Some(League::Nhl),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            League::Nfl => "nfl",
            League::Nba => "nba",
            League::Mlb => "mlb",
            League::Nhl => "nhl",
        }
    }

    fn teams(self) -> &'static [(&'static str, &'static str)] {
        match self {
            League::Nfl => NFL,
            League::Nba => NBA,
            League::Mlb => MLB,
            League::Nhl => NHL,
        }
    }
}

/// Resolves a LOGO body such as `NFL:Chiefs` or `nba:LAL`.
pub fn resolve(body: &str) -> Option<String> {
    let (league, team) = body.split_once(':')?;
    logo_url(League::parse(league)?, team)
}

pub fn logo_url(league: League, team: &str) -> Option<String> {
    let abbr = find_team(league, team)?;
    Some(format!(
        "https://a.espncdn.com/i/teamlogos/{}/500/{}.png",
        league.as_str(),
        abbr
    ))
}

/// Exact name, then abbreviation, then substring either way.
/// Substring matching needs at least three characters.
fn find_team(league: League, query: &str) -> Option<&'static str> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    let teams = league.teams();

    if let Some((_, abbr)) = teams.iter().find(|(name, _)| name.to_lowercase() == q) {
        return Some(*abbr);
    }
    if let Some((_, abbr)) = teams.iter().find(|(_, abbr)| *abbr == q) {
        return Some(*abbr);
    }
    if let Some((_, _, abbr)) = ALT_ABBR.iter().find(|(l, alt, _)| *l == league && *alt == q) {
        return Some(*abbr);
    }
    if q.len() < 3 {
        return None;
    }
    teams
        .iter()
        .find(|(name, _)| {
            let name = name.to_lowercase();
            name.contains(&q) || q.contains(&name)
        })
        .map(|(_, abbr)| *abbr)
}

/// Common abbreviations that differ from the CDN's.
const ALT_ABBR: &[(League, &str, &str)] = &[
    (League::Nfl, "was", "wsh"),
    (League::Nfl, "jac", "jax"),
    (League::Nfl, "la", "lar"),
    (League::Nfl, "oak", "lv"),
    (League::Nba, "gsw", "gs"),
    (League::Nba, "nyk", "ny"),
    (League::Nba, "brk", "bkn"),
    (League::Nba, "nop", "no"),
    (League::Nba, "sas", "sa"),
    (League::Nba, "uta", "utah"),
    (League::Nba, "was", "wsh"),
    (League::Mlb, "cws", "chw"),
    (League::Mlb, "was", "wsh"),
    (League::Mlb, "ath", "oak"),
    (League::Nhl, "lak", "la"),
    (League::Nhl, "njd", "nj"),
    (League::Nhl, "sjs", "sj"),
    (League::Nhl, "tbl", "tb"),
    (League::Nhl, "was", "wsh"),
];

const NFL: &[(&str, &str)] = &[
    ("Arizona Cardinals", "ari"),
    ("Atlanta Falcons", "atl"),
    ("Baltimore Ravens", "bal"),
    ("Buffalo Bills", "buf"),
    ("Carolina Panthers", "car"),
    ("Chicago Bears", "chi"),
    ("Cincinnati Bengals", "cin"),
    ("Cleveland Browns", "cle"),
    ("Dallas Cowboys", "dal"),
    ("Denver Broncos", "den"),
    ("Detroit Lions", "det"),
    ("Green Bay Packers", "gb"),
    ("Houston Texans", "hou"),
    ("Indianapolis Colts", "ind"),
    ("Jacksonville Jaguars", "jax"),
    ("Kansas City Chiefs", "kc"),
    ("Las Vegas Raiders", "lv"),
    ("Los Angeles Chargers", "lac"),
    ("Los Angeles Rams", "lar"),
    ("Miami Dolphins", "mia"),
    ("Minnesota Vikings", "min"),
    ("New England Patriots", "ne"),
    ("New Orleans Saints", "no"),
    ("New York Giants", "nyg"),
    ("New York Jets", "nyj"),
    ("Philadelphia Eagles", "phi"),
    ("Pittsburgh Steelers", "pit"),
    ("San Francisco 49ers", "sf"),
    ("Seattle Seahawks", "sea"),
    ("Tampa Bay Buccaneers", "tb"),
    ("Tennessee Titans", "ten"),
    ("Washington Commanders", "wsh"),
];

const NBA: &[(&str, &str)] = &[
    ("Atlanta Hawks", "atl"),
    ("Boston Celtics", "bos"),
    ("Brooklyn Nets", "bkn"),
    ("Charlotte Hornets", "cha"),
    ("Chicago Bulls", "chi"),
    ("Cleveland Cavaliers", "cle"),
    ("Dallas Mavericks", "dal"),
    ("Denver Nuggets", "den"),
    ("Detroit Pistons", "det"),
    ("Golden State Warriors", "gs"),
    ("Houston Rockets", "hou"),
    ("Indiana Pacers", "ind"),
    ("LA Clippers", "lac"),
    ("Los Angeles Lakers", "lal"),
    ("Memphis Grizzlies", "mem"),
    ("Miami Heat", "mia"),
    ("Milwaukee Bucks", "mil"),
    ("Minnesota Timberwolves", "min"),
    ("New Orleans Pelicans", "no"),
    ("New York Knicks", "ny"),
    ("Oklahoma City Thunder", "okc"),
    ("Orlando Magic", "orl"),
    ("Philadelphia 76ers", "phi"),
    ("Phoenix Suns", "phx"),
    ("Portland Trail Blazers", "por"),
    ("Sacramento Kings", "sac"),
    ("San Antonio Spurs", "sa"),
    ("Toronto Raptors", "tor"),
    ("Utah Jazz", "utah"),
    ("Washington Wizards", "wsh"),
];

const MLB: &[(&str, &str)] = &[
    ("Arizona Diamondbacks", "ari"),
    ("Atlanta Braves", "atl"),
    ("Baltimore Orioles", "bal"),
    ("Boston Red Sox", "bos"),
    ("Chicago Cubs", "chc"),
    ("Chicago White Sox", "chw"),
    ("Cincinnati Reds", "cin"),
    ("Cleveland Guardians", "cle"),
    ("Colorado Rockies", "col"),
    ("Detroit Tigers", "det"),
    ("Houston Astros", "hou"),
    ("Kansas City Royals", "kc"),
    ("Los Angeles Angels", "laa"),
    ("Los Angeles Dodgers", "lad"),
    ("Miami Marlins", "mia"),
    ("Milwaukee Brewers", "mil"),
    ("Minnesota Twins", "min"),
    ("New York Mets", "nym"),
    ("New York Yankees", "nyy"),
    ("Athletics", "oak"),
    ("Philadelphia Phillies", "phi"),
    ("Pittsburgh Pirates", "pit"),
    ("San Diego Padres", "sd"),
    ("San Francisco Giants", "sf"),
    ("Seattle Mariners", "sea"),
    ("St. Louis Cardinals", "stl"),
    ("Tampa Bay Rays", "tb"),
    ("Texas Rangers", "tex"),
    ("Toronto Blue Jays", "tor"),
    ("Washington Nationals", "wsh"),
];

const NHL: &[(&str, &str)] = &[
    ("Anaheim Ducks", "ana"),
    ("Boston Bruins", "bos"),
    ("Buffalo Sabres", "buf"),
    ("Calgary Flames", "cgy"),
    ("Carolina Hurricanes", "car"),
    ("Chicago Blackhawks", "chi"),
    ("Colorado Avalanche", "col"),
    ("Columbus Blue Jackets", "cbj"),
    ("Dallas Stars", "dal"),
    ("Detroit Red Wings", "det"),
    ("Edmonton Oilers", "edm"),
    ("Florida Panthers", "fla"),
    ("Los Angeles Kings", "la"),
    ("Minnesota Wild", "min"),
    ("Montreal Canadiens", "mtl"),
    ("Nashville Predators", "nsh"),
    ("New Jersey Devils", "nj"),
    ("New York Islanders", "nyi"),
    ("New York Rangers", "nyr"),
    ("Ottawa Senators", "ott"),
    ("Philadelphia Flyers", "phi"),
    ("Pittsburgh Penguins", "pit"),
    ("San Jose Sharks", "sj"),
    ("Seattle Kraken", "sea"),
    ("St. Louis Blues", "stl"),
    ("Tampa Bay Lightning", "tb"),
    ("Toronto Maple Leafs", "tor"),
    ("Utah Hockey Club", "utah"),
    ("Vancouver Canucks", "van"),
    ("Vegas Golden Knights", "vgk"),
    ("Washington Capitals", "wsh"),
    ("Winnipeg Jets", "wpg"),
];
