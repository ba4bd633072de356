//! Curated dataset returned when every other source is unavailable

use crate::model::{Category, Item, ItemKind, ItemType};
use crate::normalize::{item_id_from_url, normalize_tags};

/// Source name stamped on curated items
pub const CURATED_SOURCE: &str = "curated";

/// Curated entries rank below every live source
pub const CURATED_PRIORITY: u32 = 50;

struct Entry {
    title: &'static str,
    description: &'static str,
    link: &'static str,
    category: Category,
    item_type: ItemType,
    tags: &'static [&'static str],
}

const ENTRIES: &[Entry] = &[
    Entry {
        title: "React",
        description: "A JavaScript library for building user interfaces",
        link: "https://github.com/facebook/react",
        category: Category::FrontendDevelopment,
        item_type: ItemType::Framework,
        tags: &["javascript", "ui", "frontend", "spa"],
    },
    Entry {
        title: "Next.js",
        description: "The React Framework for Production",
        link: "https://github.com/vercel/next.js",
        category: Category::FrontendDevelopment,
        item_type: ItemType::Framework,
        tags: &["react", "framework", "ssr", "frontend"],
    },
    Entry {
        title: "Vue.js",
        description: "Progressive JavaScript Framework",
        link: "https://github.com/vuejs/core",
        category: Category::FrontendDevelopment,
        item_type: ItemType::Framework,
        tags: &["javascript", "frontend", "spa"],
    },
    Entry {
        title: "Angular",
        description: "Platform for building mobile and desktop web applications",
        link: "https://github.com/angular/angular",
        category: Category::FrontendDevelopment,
        item_type: ItemType::Framework,
        tags: &["typescript", "frontend", "google"],
    },
    Entry {
        title: "Spring Boot",
        description: "Java-based framework for creating stand-alone production-grade applications",
        link: "https://github.com/spring-projects/spring-boot",
        category: Category::BackendDevelopment,
        item_type: ItemType::Framework,
        tags: &["java", "spring", "enterprise"],
    },
    Entry {
        title: "Django",
        description: "High-level Python Web framework",
        link: "https://github.com/django/django",
        category: Category::BackendDevelopment,
        item_type: ItemType::Framework,
        tags: &["python", "web", "orm"],
    },
    Entry {
        title: "Express",
        description: "Fast, unopinionated web framework for Node.js",
        link: "https://github.com/expressjs/express",
        category: Category::BackendDevelopment,
        item_type: ItemType::Framework,
        tags: &["nodejs", "javascript", "web"],
    },
    Entry {
        title: "Flutter",
        description: "Google's UI toolkit for building mobile, web, and desktop apps",
        link: "https://github.com/flutter/flutter",
        category: Category::MobileDevelopment,
        item_type: ItemType::Framework,
        tags: &["dart", "mobile", "cross-platform"],
    },
    Entry {
        title: "React Native",
        description: "Framework for building native apps with React",
        link: "https://github.com/facebook/react-native",
        category: Category::MobileDevelopment,
        item_type: ItemType::Framework,
        tags: &["react", "mobile", "javascript"],
    },
    Entry {
        title: "Kotlin",
        description: "Modern programming language for Android development",
        link: "https://github.com/JetBrains/kotlin",
        category: Category::MobileDevelopment,
        item_type: ItemType::Language,
        tags: &["android", "jvm", "mobile"],
    },
    Entry {
        title: "Kubernetes",
        description: "Production-Grade Container Orchestration",
        link: "https://github.com/kubernetes/kubernetes",
        category: Category::CloudNative,
        item_type: ItemType::Tool,
        tags: &["containers", "orchestration", "cloud"],
    },
    Entry {
        title: "Docker",
        description: "Container platform for building, sharing, and running applications",
        link: "https://github.com/docker/docker-ce",
        category: Category::CloudNative,
        item_type: ItemType::Tool,
        tags: &["containers", "virtualization"],
    },
    Entry {
        title: "Jenkins",
        description: "Automation server for building, deploying, and automating projects",
        link: "https://github.com/jenkinsci/jenkins",
        category: Category::DevOps,
        item_type: ItemType::Tool,
        tags: &["automation", "ci-cd", "java"],
    },
    Entry {
        title: "GitHub Actions",
        description: "Automate your workflow from idea to production",
        link: "https://github.com/features/actions",
        category: Category::DevOps,
        item_type: ItemType::Platform,
        tags: &["automation", "ci-cd", "github"],
    },
    Entry {
        title: "OWASP ZAP",
        description: "Web app security scanner",
        link: "https://github.com/zaproxy/zaproxy",
        category: Category::Security,
        item_type: ItemType::Tool,
        tags: &["security", "testing", "scanner"],
    },
    Entry {
        title: "Vault",
        description: "Tool for secrets management, encryption, and privileged access",
        link: "https://github.com/hashicorp/vault",
        category: Category::Security,
        item_type: ItemType::Tool,
        tags: &["security", "secrets", "encryption"],
    },
    Entry {
        title: "TensorFlow",
        description: "Open source platform for machine learning",
        link: "https://github.com/tensorflow/tensorflow",
        category: Category::DataAndAi,
        item_type: ItemType::Library,
        tags: &["machine-learning", "ai", "python"],
    },
    Entry {
        title: "PyTorch",
        description: "Machine learning framework for Python",
        link: "https://github.com/pytorch/pytorch",
        category: Category::DataAndAi,
        item_type: ItemType::Library,
        tags: &["machine-learning", "ai", "python"],
    },
    Entry {
        title: "Visual Studio Code",
        description: "Code editor redefined and optimized for building modern web and cloud applications",
        link: "https://github.com/microsoft/vscode",
        category: Category::DevelopmentTools,
        item_type: ItemType::Tool,
        tags: &["editor", "ide", "microsoft"],
    },
    Entry {
        title: "Git",
        description: "Distributed version control system",
        link: "https://github.com/git/git",
        category: Category::DevelopmentTools,
        item_type: ItemType::Tool,
        tags: &["version-control", "cli"],
    },
];

/// The bundled dataset, never empty
pub fn fallback_items() -> Vec<Item> {
    ENTRIES
        .iter()
        .map(|entry| Item {
            id: item_id_from_url(entry.link),
            kind: ItemKind::Resource,
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            link: entry.link.to_string(),
            category: entry.category,
            item_type: entry.item_type,
            tags: normalize_tags(entry.tags.iter().copied()),
            source: CURATED_SOURCE.to_string(),
            source_priority: CURATED_PRIORITY,
            popularity: None,
            author: None,
            published_at: None,
            date_added: None,
            last_checked: None,
        })
        .collect()
}
