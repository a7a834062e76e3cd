pub const SITE_TITLE: &str = "VatraMC";
pub const TAGLINE: &str = "Найкращий український сервер Minecraft";
pub const JOIN_DISCORD: &str = "Приєднатися до Discord";
pub const VIEW_STATUS: &str = "Переглянути статус";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub id: &'static str,
    pub class: &'static str,
    pub aria_label: &'static str,
}

pub const SECTIONS: [Section; 6] = [
    Section {
        id: "hero",
        class: "hero",
        aria_label: "Вітання",
    },
    Section {
        id: "status",
        class: "server-status",
        aria_label: "Статус сервера",
    },
    Section {
        id: "discord",
        class: "discord",
        aria_label: "Discord",
    },
    Section {
        id: "features",
        class: "features-ua",
        aria_label: "Особливості",
    },
    Section {
        id: "rules",
        class: "rules",
        aria_label: "Правила",
    },
    Section {
        id: "about",
        class: "about bg",
        aria_label: "Про сервер",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub target: &'static str,
    pub label: &'static str,
}

pub const NAV_LINKS: [NavLink; 4] = [
    NavLink {
        target: "status",
        label: "Статус",
    },
    NavLink {
        target: "features",
        label: "Фічі",
    },
    NavLink {
        target: "rules",
        label: "Правила",
    },
    NavLink {
        target: "about",
        label: "Про нас",
    },
];

/// Icon drawn on a feature card; also its CSS modifier class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureIcon {
    Sword,
    Shield,
    Globe,
    Crown,
    World,
    Bolt,
}

impl FeatureIcon {
    pub fn class(self) -> &'static str {
        match self {
            Self::Sword => "sword",
            Self::Shield => "shield",
            Self::Globe => "globe",
            Self::Crown => "crown",
            Self::World => "world",
            Self::Bolt => "bolt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub icon: FeatureIcon,
    pub title: &'static str,
    pub blurb: &'static str,
}

pub const FEATURES_HEADING: &str = "Особливості Сервера";

pub const FEATURES: [Feature; 6] = [
    Feature {
        icon: FeatureIcon::Sword,
        title: "PvP Система",
        blurb: "Захоплюючі PvP битви та турніри з нагородами для найкращих воїнів.",
    },
    Feature {
        icon: FeatureIcon::Shield,
        title: "Захист Територій",
        blurb: "Повний захист ваших будівель та ресурсів від ґріферів (GriefPrevention).",
    },
    Feature {
        icon: FeatureIcon::Globe,
        title: "Towny & Клани",
        blurb: "Створюйте міста, об’єднуйтесь у клани та будуйте цивілізації з друзями.",
    },
    Feature {
        icon: FeatureIcon::Crown,
        title: "Політична Система",
        blurb: "Участь у житті сервера: вибори мерів, керування містами та альянсами.",
    },
    Feature {
        icon: FeatureIcon::World,
        title: "Великий Світ",
        blurb: "Велетенська карта з унікальними біомами, структурами та пригодами.",
    },
    Feature {
        icon: FeatureIcon::Bolt,
        title: "Без Вайпів",
        blurb: "Ваш прогрес збережено назавжди, ніяких вайпів карти чи інвентаря.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allowed,
    Banned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleList {
    pub kind: RuleKind,
    pub title: &'static str,
    pub items: &'static [&'static str],
}

pub const ALLOWED: RuleList = RuleList {
    kind: RuleKind::Allowed,
    title: "Дозволено",
    items: &[
        "Будівництво та креативні проєкти в будь‑якому стилі",
        "Торгівля, бартер та створення власних магазинів",
        "Автоматичні ферми, що не створюють надмірних лагів",
        "Редстоун‑механізми в межах оптимізації сервера",
        "Клієнтські моди без переваги (OptiFine/Sodium, шейдери тощо)",
        "PvP за взаємною згодою або у спеціальних зонах",
        "Створення міст, кланів та альянсів",
        "Текстурпаки та шрифти, що не дають ігрової переваги",
    ],
};

pub const BANNED: RuleList = RuleList {
    kind: RuleKind::Banned,
    title: "Заборонено",
    items: &[
        "Чіти, макроси, автоклікери, X‑Ray або будь‑які моди з перевагою",
        "Використання багів/експлойтів, дюп та обхід ігрових механік",
        "Ґріферство: руйнування чи псування чужих будівель, саботаж ферм",
        "Крадіжка майна або шахрайство під час торгівлі",
        "Спам, флуд, нав’язлива реклама, масовий капс",
        "Образи, токсичність, дискримінація, мова ненависті",
        "Обхід покарань і використання альт‑акаунтів для обходу бану",
        "Намірне створення лагів: 0‑tick/lag‑машини, безкінечні цикли",
        "DDoS/DoS, погрози або розкриття особистих даних",
        "Спроби отримати несанкціонований доступ до чужих акаунтів",
        "Клієнти/моди з packet spoofing, fly/velocity та подібні",
        "Будь‑які дії, що суперечать правилам нашого Discord‑серверу",
    ],
};

impl RuleList {
    pub fn class(&self) -> &'static str {
        match self.kind {
            RuleKind::Allowed => "allowed",
            RuleKind::Banned => "banned",
        }
    }
}

pub const RULE_LISTS: [RuleList; 2] = [ALLOWED, BANNED];

pub const DISCORD_HEADING: &str = "Наш Discord";
pub const DISCORD_BLURB: &str = "Приєднуйся до ком’юніті, спілкуйся та слідкуй за новинами.";

pub const ABOUT_HEADING: &str = "Про наш сервер";
pub const ABOUT_LEAD: &str =
    "VatraMC, ванільний сервер з акуратними покращеннями, що зберігають дух оригінального Minecraft.";
pub const ABOUT_ITEMS: [&str; 4] = [
    "Будуйте міста та розвивайте спільноту разом з іншими гравцями",
    "Маркетплейс для зручної торгівлі та розвиток економіки",
    "Івенти та сезонні активності протягом року",
    "Чесні правила, без Pay‑To‑Win, активна модерація",
];

pub const DISCORD_LOGO: &str = "/discord.svg";

pub fn section(id: &str) -> Option<&'static Section> {
    SECTIONS.iter().find(|section| section.id == id)
}

/// `section` plus its modifier class, as written on the element.
pub fn section_class(section: &Section) -> String {
    format!("section {}", section.class)
}

pub fn footer_text(year: i32) -> String {
    format!("© {year} {SITE_TITLE}. Усі права захищено.")
}

/// Anchor `href` for an in-page link. The click handler scrolls instead of
/// jumping, but the fragment keeps the link usable without script.
pub fn fragment_href(target: &str) -> String {
    match section(target) {
        Some(section) => format!("#{}", section.id),
        None => "#".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nav_link_has_a_section() {
        for link in &NAV_LINKS {
            assert!(section(link.target).is_some(), "{}", link.target);
        }
        assert!(section("missing").is_none());
    }

    #[test]
    fn rule_lists_are_complete() {
        assert_eq!(ALLOWED.items.len(), 8);
        assert_eq!(BANNED.items.len(), 12);
        assert_eq!(FEATURES.len(), 6);
        assert_eq!(ABOUT_ITEMS.len(), 4);
        assert_eq!(RULE_LISTS.map(|list| list.class()), ["allowed", "banned"]);
    }

    #[test]
    fn section_ids_are_unique() {
        for (index, section) in SECTIONS.iter().enumerate() {
            assert!(SECTIONS[index + 1..].iter().all(|other| other.id != section.id));
        }
        assert_eq!(section_class(&SECTIONS[5]), "section about bg");
    }

    #[test]
    fn feature_classes_are_distinct() {
        let mut classes: Vec<_> = FEATURES.iter().map(|feature| feature.icon.class()).collect();
        classes.sort_unstable();
        classes.dedup();
        assert_eq!(classes.len(), FEATURES.len());
    }

    #[test]
    fn footer_names_the_year() {
        assert_eq!(footer_text(2025), "© 2025 VatraMC. Усі права захищено.");
    }

    #[test]
    fn unknown_fragments_point_at_the_top() {
        assert_eq!(fragment_href("rules"), "#rules");
        assert_eq!(fragment_href("nowhere"), "#");
    }
}
