use crate::models::page::PageMeta;

const PAGES: &[PageMeta] = &[
    PageMeta {
        slug: "home",
        path: "/",
        title: "Brightpath Academy",
        description: "Emotional intelligence programs for schools, universities and teams.",
        in_navigation: true,
    },
    PageMeta {
        slug: "programs",
        path: "/programs",
        title: "Programs",
        description: "Instructor-led and self-paced courses for learners and educators.",
        in_navigation: true,
    },
    PageMeta {
        slug: "institutions",
        path: "/institutions",
        title: "For Institutions",
        description: "Licensing, onboarding and reporting for schools and organizations.",
        in_navigation: true,
    },
    PageMeta {
        slug: "assessment",
        path: "/assessment",
        title: "Free Self-Assessment",
        description: "A timed questionnaire with a personal five-category profile.",
        in_navigation: true,
    },
    PageMeta {
        slug: "certificates",
        path: "/certificates",
        title: "Certificate Validation",
        description: "Confirm that a Brightpath certificate is genuine.",
        in_navigation: false,
    },
    PageMeta {
        slug: "demo",
        path: "/demo",
        title: "Request a Demo",
        description: "See the platform with your own team.",
        in_navigation: false,
    },
    PageMeta {
        slug: "about",
        path: "/about",
        title: "About Us",
        description: "Who we are and how we work.",
        in_navigation: true,
    },
    PageMeta {
        slug: "contact",
        path: "/contact",
        title: "Contact",
        description: "Questions about programs, pricing or partnerships.",
        in_navigation: true,
    },
    PageMeta {
        slug: "privacy",
        path: "/privacy",
        title: "Privacy Policy",
        description: "How we handle the information you share with us.",
        in_navigation: false,
    },
];

pub fn all() -> &'static [PageMeta] {
    PAGES
}

pub fn find(slug: &str) -> Option<&'static PageMeta> {
    PAGES.iter().find(|page| page.slug == slug)
}
