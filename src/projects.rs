//! Static project catalogue and the model types the scene widget can show.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::geometry::Primitive;

/// Model shown by a scene widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Cube,
    Triangle,
    Donut,
    Wing,
    Carousel,
    Projet2,
    Projet3,
}

/// Shared fallback for every authored model.
pub const FALLBACK_MODEL: &str = "/models/projet1.glb";

impl ModelType {
    pub const ALL: [ModelType; 7] = [
        Self::Cube,
        Self::Triangle,
        Self::Donut,
        Self::Wing,
        Self::Carousel,
        Self::Projet2,
        Self::Projet3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::Triangle => "triangle",
            Self::Donut => "donut",
            Self::Wing => "wing",
            Self::Carousel => "carousel",
            Self::Projet2 => "projet2",
            Self::Projet3 => "projet3",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.name() == name.trim())
    }

    /// Unknown names display the cube.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("unknown model type {name:?}; showing the cube");
            Self::default()
        })
    }

    /// Root-relative path of the authored model, if this type has one.
    pub fn asset(self) -> Option<&'static str> {
        match self {
            Self::Wing => Some("/models/kagome.gltf"),
            Self::Projet2 => Some("/models/projet2/projet2.gltf"),
            _ => None,
        }
    }

    /// Procedural shape for this type at size multiplier `m`. Types backed by
    /// an authored model get the cube, which is also their final fallback.
    pub fn shape(self, m: f32) -> Primitive {
        match self {
            Self::Triangle => Primitive::Tetrahedron { radius: 1.5 * m },
            Self::Carousel => Primitive::Cylinder {
                radius_top: 1.2 * m,
                radius_bottom: 1.2 * m,
                height: 0.6 * m,
                radial_segments: 32,
                height_segments: 8,
            },
            Self::Donut => Primitive::Torus {
                radius: m,
                tube: 0.4 * m,
                radial_segments: 16,
                tubular_segments: 100,
            },
            Self::Cube | Self::Wing | Self::Projet2 | Self::Projet3 => {
                Primitive::Box { size: 2.0 * m }
            }
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModelType(pub String);

impl fmt::Display for UnknownModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown model type `{}`", self.0)
    }
}

impl std::error::Error for UnknownModelType {}

impl FromStr for ModelType {
    type Err = UnknownModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownModelType(s.to_string()))
    }
}

/// How a project appears as a card on the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectCard {
    pub title: &'static str,
    pub summary: &'static str,
    pub tags: &'static [&'static str],
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Project {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub long_description: &'static str,
    pub tags: &'static [&'static str],
    pub technologies: &'static [&'static str],
    pub images: &'static [&'static str],
    pub model: ModelType,
    pub card: ProjectCard,
}

impl Project {
    /// Route segment of the detail page.
    pub fn slug(&self) -> String {
        self.id.to_string()
    }
}

pub fn find(id: &str) -> Option<&'static Project> {
    let id: u32 = id.trim().parse().ok()?;
    PROJECTS.iter().find(|project| project.id == id)
}

pub static PROJECTS: [Project; 3] = [
    Project {
        id: 1,
        title: "Projet 1 - Inflatable wing",
        description: "Conception et validation d'une aile gonflable pour drones de type avion",
        long_description: "J'ai mené un projet complet de conception et de validation d'une aile gonflable destinée à des drones de type avion, avec un objectif clair : maintenir un profil aérodynamique fiable malgré la pression interne et les charges rencontrées en vol. Pour répondre à cette problématique, j'ai travaillé sur la définition de la géométrie de l'aile (profil NACA 2412) et sur l'architecture interne, en développant une structure inspirée du drop-stitch à partir d'un maillage kagome, afin de mieux contrôler la rigidité, la tenue de forme et la répartition des efforts.

Le prototype a été réalisé en TPU imprimé en 3D par SLS, ce qui m'a amené à intégrer des contraintes de fabrication additive dès la conception (choix de structure, épaisseurs, zones critiques, assemblage). J'ai ensuite construit une démarche de validation expérimentale et de corrélation numérique : caractérisation du matériau via essais de traction (type ASTM D638), analyse des données (contrainte/déformation, déplacement), et contrôle géométrique par scan 3D pour mesurer précisément la déformation et la conservation du profil. En parallèle, j'ai réalisé des simulations (pression interne + charges extérieures, avec une logique de couplage structure/aéro selon les cas) pour comparer les résultats numériques aux mesures réelles, identifier les écarts, comprendre les mécanismes de déformation et orienter les itérations de conception.

Enfin, le projet ne s'est pas limité au prototype : il ouvre aussi une voie \"industrialisation\" grâce au choix du TPU, en explorant des solutions de post-traitement et d'assemblage (thermique et/ou chimique) adaptées à des pièces grandes et complexes, là où d'autres approches (notamment résine) sont plus limitées. Au final, ce travail m'a permis de mobiliser à la fois des compétences en conception mécanique, fabrication additive, expérimentation, analyse de données, et simulation, avec une approche itérative orientée performance et validation.",
        tags: &["CAO", "Simulation", "Prototypage", "science des matériaux"],
        technologies: &["SolidWorks", "ANSYS", "MATLAB", "Impression 3D"],
        images: &["/projects/projet1/image.png"],
        model: ModelType::Wing,
        card: ProjectCard {
            title: "Projet 1",
            summary: "inflatable wing",
            tags: &["CAO", "Simulation", "Prototypage"],
            scale: 1.6,
        },
    },
    Project {
        id: 2,
        title: "Projet 2 - Kickstarter carrousel Lofi data tracker",
        description: "Lofi data tracker hardware product design",
        long_description: "Carrousel est un projet de produit hardware \"luxury lo-fi\" conçu pour rendre le suivi de données plus simple, plus calme et plus tangible.
L'idée de base : consulter des métriques utiles sans retomber automatiquement dans le réflexe \"écran + notifications\".
Le produit propose une interaction physique (contrôles tactiles) et un retour visuel clair pour parcourir des indicateurs en quelques secondes.
Carrousel vise une expérience \"calm tech\" : minimaliste, agréable, et pensée pour durer.
Le projet combine une approche design produit premium et une contrainte forte de faisabilité industrielle.
J'ai structuré le concept autour d'usages concrets : sélectionner, comparer et comprendre une donnée sans friction.
Une attention particulière a été portée à l'ergonomie (lecture rapide, logique de navigation, feedback).
Côté technique, le projet couvre l'architecture électronique, le choix des composants et la logique d'interface.
Le prototypage a servi à valider la prise en main, la lisibilité et la cohérence globale de l'objet.
En parallèle, j'ai travaillé la logique de coûts (BOM), les arbitrages composants et les options de fabrication.
Le produit est pensé pour passer du prototype à une production en petite série, avec une roadmap claire.
Carrousel intègre aussi une dimension marque : positionnement premium, cohérence visuelle, et identité produit.
L'objectif final est de proposer un objet utile au quotidien, qui valorise la donnée sans la rendre envahissante.
Ce projet illustre ma capacité à relier vision produit, contraintes d'ingénierie et logique business.
Carrousel est une synthèse entre design, électronique, prototypage et préparation à l'industrialisation.",
        tags: &["Analyse", "Design", "Fabrication", "kickstarter", "design produit"],
        technologies: &[
            "Kickstarter",
            "Solidworks",
            "Python",
            "CNC",
            "kicad",
            "JLCPCB",
            "3D printing",
        ],
        images: &["/projects/projet2/aefa.jpeg"],
        model: ModelType::Projet2,
        card: ProjectCard {
            title: "Projet 2",
            summary: "kickstarter project",
            tags: &["Analyse", "Design", "Fabrication"],
            scale: 1.0,
        },
    },
    Project {
        id: 3,
        title: "Projet 3 - Hive-Robotics",
        description: "Robot de livraison autonome pour environnements outdoors",
        long_description: "HIVE-Robotics est un projet de robotique orienté innovation produit et prototypage rapide, où je conçois et industrialise des systèmes mêlant mécanique, électronique et software embarqué. L'objectif : créer des solutions robotiques fiables et réalistes à déployer, en s'appuyant sur une approche très \"terrain\" (tests, itérations, contraintes de fabrication, sécurité).

Ce que je fais concrètement

Conception mécanique : architecture, pièces sur-mesure, intégration, itérations orientées fabrication (impression 3D / usinage).

Électronique & PCB : choix composants, schémas, routage, capteurs/puissance, intégration et debug.

Embarqué & contrôle : firmware, drivers, communication (I2C/serial), mise au point et validation.

Prototypage & tests : plans d'essais, mesures, fiabilisation, corrections jusqu'à un système stable.

Gestion de projet : coordination, documentation, livrables, relation partenaires/sponsors.

Points forts du projet

Approche end-to-end (de l'idée → prototype fonctionnel).

Forte capacité d'itération (design → fabrication → test → amélioration).

Vision produit : robustesse, coût, intégration, maintenance, sécurité.

Technologies & outils (exemples)

CAO (SolidWorks), prototypage (impression 3D), électronique (KiCad), microcontrôleurs (STM32), programmation (Rust / C / Arduino selon besoin), tests & instrumentation.",
        tags: &["Optimisation", "Tests", "Production"],
        technologies: &["CATIA", "Abaqus", "Lean Manufacturing", "Six Sigma"],
        images: &["/projects/projet3/aa.jpeg"],
        model: ModelType::Projet3,
        card: ProjectCard {
            title: "Projet 3",
            summary: "hive robotics projet",
            tags: &["Optimisation", "Tests", "Production"],
            scale: 1.0,
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        for model in ModelType::ALL {
            assert_eq!(ModelType::parse(model.name()), Some(model));
            assert_eq!(model.to_string().parse::<ModelType>(), Ok(model));
        }
        assert_eq!(ModelType::parse("sphere"), None);
        assert!("".parse::<ModelType>().is_err());
    }

    #[test]
    fn unknown_names_fall_back_to_cube() {
        assert_eq!(ModelType::from_name_or_default("sphere"), ModelType::Cube);
        assert_eq!(ModelType::from_name_or_default("donut"), ModelType::Donut);
    }

    #[test]
    fn shapes_scale_linearly() {
        for model in ModelType::ALL {
            let base = model.shape(1.0).characteristic_size();
            let scaled = model.shape(2.5).characteristic_size();
            assert!((scaled - base * 2.5).abs() < 1e-5, "{model}");
        }
        assert_eq!(ModelType::Projet3.shape(1.0), Primitive::Box { size: 2.0 });
        assert_eq!(ModelType::Donut.shape(1.0).kind(), "torus");
        assert_eq!(ModelType::Carousel.shape(1.0).kind(), "cylinder");
        assert_eq!(ModelType::Triangle.shape(1.0).kind(), "tetrahedron");
    }

    #[test]
    fn only_authored_types_have_assets() {
        let authored: Vec<ModelType> = ModelType::ALL
            .into_iter()
            .filter(|model| model.asset().is_some())
            .collect();
        assert_eq!(authored, vec![ModelType::Wing, ModelType::Projet2]);
    }

    #[test]
    fn catalogue_is_ordered_and_addressable() {
        let ids: Vec<u32> = PROJECTS.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(find("2").map(|p| p.model), Some(ModelType::Projet2));
        assert!(find("4").is_none());
        assert!(find("abc").is_none());
        assert_eq!(PROJECTS[0].card.scale, 1.6);
        assert!(PROJECTS.iter().all(|p| !p.images.is_empty()));
    }
}
