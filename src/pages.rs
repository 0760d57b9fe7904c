//! Routes, page view models and static HTML rendering.
//!
//! Pages are generated ahead of time. Every scene widget is emitted as an
//! empty placeholder carrying its model type and scale; the WebAssembly
//! build mounts a widget into each one.

use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::SiteConfig;
use crate::projects::{self, ModelType, Project, PROJECTS};

pub const SITE_TITLE: &str = "Dimitry Portfolio";
pub const BACKGROUND_CANVAS_ID: &str = "topographic-background";
pub const WIDGET_CLASS: &str = "scene-widget";
pub const CONTACT_EMAIL: &str = "contact@example.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Listing,
    Detail(String),
    NotFound,
}

impl Route {
    /// Parses a site-relative path. A deployment prefix must be stripped
    /// beforehand.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path {
            "" | "/" | "/index.html" => return Self::Listing,
            _ => {}
        }
        let rest = path.trim_end_matches('/').trim_end_matches("/index.html");
        match rest.strip_prefix("/projects/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Self::Detail(id.to_string()),
            _ => Self::NotFound,
        }
    }
}

/// Ids for which a detail page is generated.
pub fn static_params() -> Vec<String> {
    PROJECTS.iter().map(Project::slug).collect()
}

/// Placeholder for a scene widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WidgetSlot {
    pub model: ModelType,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub href: String,
    pub title: &'static str,
    pub summary: &'static str,
    pub tags: &'static [&'static str],
    pub widget: WidgetSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
    pub cards: Vec<CardView>,
}

impl ListingPage {
    /// One card per project, in catalogue order.
    pub fn build(config: &SiteConfig) -> Self {
        let cards = PROJECTS
            .iter()
            .map(|project| CardView {
                href: config.asset_path(&format!("/projects/{}", project.id)),
                title: project.card.title,
                summary: project.card.summary,
                tags: project.card.tags,
                widget: WidgetSlot {
                    model: project.model,
                    scale: project.card.scale,
                },
            })
            .collect();
        Self { cards }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPage {
    pub project: &'static Project,
    pub home_href: String,
    pub widget: WidgetSlot,
    /// Image URLs resolved for the deployment.
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DetailView {
    Found(DetailPage),
    NotFound { home_href: String },
}

impl DetailView {
    pub fn for_id(id: &str, config: &SiteConfig) -> Self {
        let home_href = config.asset_path("/");
        match projects::find(id) {
            Some(project) => Self::Found(DetailPage {
                project,
                home_href,
                widget: WidgetSlot {
                    model: project.model,
                    scale: 1.0,
                },
                images: project
                    .images
                    .iter()
                    .map(|image| config.asset_path(image))
                    .collect(),
            }),
            None => {
                log::info!("no project with id {id:?}");
                Self::NotFound { home_href }
            }
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Rendered page and the HTTP status it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: u16,
    pub html: String,
}

pub fn render_route(route: &Route, config: &SiteConfig) -> RenderedPage {
    match route {
        Route::Listing => RenderedPage {
            status: 200,
            html: render_listing(&ListingPage::build(config), config),
        },
        // unknown ids render the not-found view with a success status
        Route::Detail(id) => RenderedPage {
            status: 200,
            html: render_detail(&DetailView::for_id(id, config), config),
        },
        Route::NotFound => RenderedPage {
            status: 404,
            html: render_detail(
                &DetailView::NotFound {
                    home_href: config.asset_path("/"),
                },
                config,
            ),
        },
    }
}

/// Every generated file as `(relative path, html)`: the landing page, one
/// page per static param and a `404.html`.
pub fn site_pages(config: &SiteConfig) -> Vec<(PathBuf, String)> {
    let mut pages = vec![(
        PathBuf::from("index.html"),
        render_route(&Route::Listing, config).html,
    )];
    for id in static_params() {
        let page = render_route(&Route::Detail(id.clone()), config);
        pages.push((
            PathBuf::from("projects").join(&id).join("index.html"),
            page.html,
        ));
    }
    pages.push((
        PathBuf::from("404.html"),
        render_route(&Route::NotFound, config).html,
    ));
    pages
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl WidgetSlot {
    pub fn to_html(&self, class: &str) -> String {
        format!(
            r#"<div class="{WIDGET_CLASS} {class}" data-model-type="{}" data-scale="{}"></div>"#,
            self.model, self.scale
        )
    }
}

const STYLESHEET: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: system-ui, sans-serif; color: #e2e8f0; background: #0f172a; line-height: 1.5; }
a { color: inherit; text-decoration: none; }
#topographic-background { position: fixed; inset: 0; width: 100%; height: 100%; z-index: -1; }
.container { max-width: 72rem; margin: 0 auto; padding: 3rem 1rem; }
header { position: sticky; top: 0; z-index: 10; background: rgba(15, 23, 42, 0.5); border-bottom: 1px solid #334155; }
header nav { display: flex; justify-content: space-between; align-items: center; max-width: 80rem; margin: 0 auto; padding: 1rem; }
header nav .links { display: flex; gap: 1.5rem; color: #cbd5e1; }
.hero { text-align: center; padding: 3rem 0 5rem; }
.hero h2 { font-size: 3rem; margin-bottom: 1.5rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(18rem, 1fr)); gap: 2rem; }
.card { display: block; background: rgba(30, 41, 59, 0.8); border: 1px solid #334155; border-radius: 0.75rem; overflow: hidden; transition: transform 0.3s; }
.card:hover { transform: translateY(-0.5rem); }
.card .body { padding: 1.5rem; }
.card-widget { height: 16rem; }
.detail-widget { height: 500px; }
.tags { display: flex; flex-wrap: wrap; gap: 0.5rem; margin: 1rem 0; }
.tag { padding: 0.25rem 0.75rem; border-radius: 9999px; font-size: 0.875rem; background: rgba(30, 58, 138, 0.5); color: #bfdbfe; border: 1px solid #1d4ed8; }
.panel { background: #1e293b; border-radius: 1rem; padding: 2rem; margin-bottom: 2rem; }
.long { white-space: pre-line; color: #cbd5e1; }
.gallery { display: grid; grid-template-columns: repeat(auto-fit, minmax(20rem, 1fr)); gap: 1rem; }
.gallery img { width: 100%; aspect-ratio: 16 / 9; object-fit: cover; border-radius: 0.5rem; }
.cta { display: inline-block; padding: 0.75rem 2rem; background: #2563eb; color: #fff; border-radius: 0.5rem; }
footer { border-top: 1px solid #334155; margin-top: 5rem; padding: 2rem; text-align: center; color: #94a3b8; }
.not-found { min-height: 100vh; display: flex; flex-direction: column; align-items: center; justify-content: center; gap: 1rem; }
.not-found a { color: #60a5fa; text-decoration: underline; }
"#;

fn document(title: &str, body: &str, config: &SiteConfig) -> String {
    let script = config.asset_path("/pkg/portfolio_viewer.js");
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLESHEET}</style>
</head>
<body>
{body}
<script type="module">
import init, {{ hydrate }} from "{script}";
await init();
hydrate();
</script>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn push_tags(html: &mut String, tags: &[&str]) {
    html.push_str(r#"<div class="tags">"#);
    for tag in tags {
        let _ = write!(html, r#"<span class="tag">{}</span>"#, escape_html(tag));
    }
    html.push_str("</div>");
}

pub fn render_listing(page: &ListingPage, config: &SiteConfig) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        r##"<canvas id="{BACKGROUND_CANVAS_ID}"></canvas>
<header><nav><h1>{SITE_TITLE}</h1><div class="links"><a href="#about">À propos</a><a href="#projects">Projets</a><a href="#contact">Contact</a></div></nav></header>
<main class="container">
<section id="about" class="hero">
<h2>Ingénieur Mécanique</h2>
<p>{}</p>
</section>
<section id="projects">
<h3>Mes Projets</h3>
<div class="grid">
"##,
        escape_html(
            "Passionné par l'innovation et le design mécanique, je crée des solutions techniques pour résoudre des problèmes complexes."
        ),
    );

    for card in &page.cards {
        let _ = write!(
            body,
            r#"<a class="card" href="{}">{}<div class="body"><h4>{}</h4><p>{}</p>"#,
            escape_html(&card.href),
            card.widget.to_html("card-widget"),
            escape_html(card.title),
            escape_html(card.summary),
        );
        push_tags(&mut body, card.tags);
        body.push_str("<div>Voir les détails →</div></div></a>\n");
    }

    let _ = write!(
        body,
        r#"</div>
</section>
<section id="contact" class="panel hero">
<h3>Me Contacter</h3>
<p>{}</p>
<a class="cta" href="mailto:{CONTACT_EMAIL}">Envoyer un email</a>
</section>
</main>
<footer><p>© 2026 Dimitry - Ingénieur Mécanique. Tous droits réservés.</p></footer>"#,
        escape_html("Vous avez un projet ? N'hésitez pas à me contacter."),
    );

    document(SITE_TITLE, &body, config)
}

pub fn render_detail(view: &DetailView, config: &SiteConfig) -> String {
    let page = match view {
        DetailView::Found(page) => page,
        DetailView::NotFound { home_href } => {
            let body = format!(
                r#"<div class="not-found"><h1>Projet non trouvé</h1><a href="{}">Retour à l'accueil</a></div>"#,
                escape_html(home_href)
            );
            return document("Projet non trouvé", &body, config);
        }
    };
    let project = page.project;

    let mut body = String::new();
    let _ = write!(
        body,
        r#"<header><nav><a href="{}">← Retour aux projets</a></nav></header>
<main class="container">
<h1>{}</h1>
<p>{}</p>
"#,
        escape_html(&page.home_href),
        escape_html(project.title),
        escape_html(project.description),
    );
    push_tags(&mut body, project.tags);
    let _ = write!(
        body,
        r#"
<div class="panel">{}</div>
<div class="panel"><h2>Description du projet</h2><div class="long">{}</div></div>
<div class="panel"><h2>Technologies utilisées</h2>"#,
        page.widget.to_html("detail-widget"),
        escape_html(project.long_description),
    );
    push_tags(&mut body, project.technologies);
    body.push_str(r#"</div>
<div class="panel"><h2>Galerie</h2><div class="gallery">"#);
    for (index, image) in page.images.iter().enumerate() {
        let _ = write!(
            body,
            r#"<img src="{}" alt="{} - Image {}">"#,
            escape_html(image),
            escape_html(project.title),
            index + 1
        );
    }
    body.push_str("</div></div>\n</main>");

    document(project.title, &body, config)
}
