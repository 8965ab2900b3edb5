//! Where each structural entity lives in a study tree.
//!
//! Every function returns a `/`-separated target usable with
//! [`crate::tree::parse_path`] and as an `update_config`/`replace_matrix` target.

pub const STUDY_INI: &str = "study";
pub const GENERAL_DATA: &str = "settings/generaldata";
pub const COMMENTS: &str = "settings/comments";
pub const SCENARIO_BUILDER: &str = "settings/scenariobuilder";
pub const AREAS_DIR: &str = "input/areas";
pub const DISTRICTS: &str = "input/areas/sets";
pub const LINKS_DIR: &str = "input/links";
pub const BINDING_CONSTRAINTS_DIR: &str = "input/bindingconstraints";
pub const BINDING_CONSTRAINTS: &str = "input/bindingconstraints/bindingconstraints";
pub const OUTPUT_DIR: &str = "output";

/// Folder names under `input/areas` that are not areas.
pub const RESERVED_AREA_ENTRIES: [&str; 2] = ["sets", "list"];

/// Per-area time series created with every area.
pub const AREA_SERIES_KINDS: [&str; 3] = ["load", "wind", "solar"];

pub fn area_dir(area_id: &str) -> String {
    format!("{}/{}", AREAS_DIR, area_id)
}

pub fn area_optimization(area_id: &str) -> String {
    format!("{}/{}/optimization", AREAS_DIR, area_id)
}

pub fn area_ui(area_id: &str) -> String {
    format!("{}/{}/ui", AREAS_DIR, area_id)
}

pub fn area_series(kind: &str, area_id: &str) -> String {
    format!("input/{}/series/{}_{}", kind, kind, area_id)
}

pub fn area_misc_gen(area_id: &str) -> String {
    format!("input/misc-gen/miscgen-{}", area_id)
}

pub fn area_reserves(area_id: &str) -> String {
    format!("input/reserves/{}", area_id)
}

pub fn district(district_id: &str) -> String {
    format!("{}/{}", DISTRICTS, district_id)
}

pub fn links_dir(area_from: &str) -> String {
    format!("{}/{}", LINKS_DIR, area_from)
}

pub fn link_properties_file(area_from: &str) -> String {
    format!("{}/{}/properties", LINKS_DIR, area_from)
}

pub fn link_properties(area_from: &str, area_to: &str) -> String {
    format!("{}/{}/properties/{}", LINKS_DIR, area_from, area_to)
}

pub fn link_series(area_from: &str, area_to: &str) -> String {
    format!("{}/{}/{}", LINKS_DIR, area_from, area_to)
}

/// Cluster families that share the `<family>/clusters/<area>/list` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterFamily {
    Thermal,
    Renewables,
    StStorage,
}

impl ClusterFamily {
    pub fn dir(self) -> &'static str {
        match self {
            ClusterFamily::Thermal => "input/thermal",
            ClusterFamily::Renewables => "input/renewables",
            ClusterFamily::StStorage => "input/st-storage",
        }
    }

    pub fn area_clusters_dir(self, area_id: &str) -> String {
        format!("{}/clusters/{}", self.dir(), area_id)
    }

    pub fn list(self, area_id: &str) -> String {
        format!("{}/clusters/{}/list", self.dir(), area_id)
    }

    pub fn section(self, area_id: &str, cluster_id: &str) -> String {
        format!("{}/clusters/{}/list/{}", self.dir(), area_id, cluster_id)
    }

    pub fn series_dir(self, area_id: &str, cluster_id: &str) -> String {
        format!("{}/series/{}/{}", self.dir(), area_id, cluster_id)
    }

    pub fn area_series_dir(self, area_id: &str) -> String {
        format!("{}/series/{}", self.dir(), area_id)
    }
}

pub fn thermal_prepro_dir(area_id: &str, cluster_id: &str) -> String {
    format!("input/thermal/prepro/{}/{}", area_id, cluster_id)
}

pub fn thermal_area_prepro_dir(area_id: &str) -> String {
    format!("input/thermal/prepro/{}", area_id)
}

pub fn thermal_prepro(area_id: &str, cluster_id: &str) -> String {
    format!("{}/data", thermal_prepro_dir(area_id, cluster_id))
}

pub fn thermal_modulation(area_id: &str, cluster_id: &str) -> String {
    format!("{}/modulation", thermal_prepro_dir(area_id, cluster_id))
}

pub fn cluster_series(family: ClusterFamily, area_id: &str, cluster_id: &str) -> String {
    format!("{}/series", family.series_dir(area_id, cluster_id))
}

pub fn storage_series(area_id: &str, storage_id: &str, name: &str) -> String {
    format!(
        "{}/{}",
        ClusterFamily::StStorage.series_dir(area_id, storage_id),
        name
    )
}

pub fn binding_constraint_series(constraint_id: &str) -> String {
    format!("{}/{}", BINDING_CONSTRAINTS_DIR, constraint_id)
}

/// Binding-constraint term key for a link (`area1%area2`).
pub fn link_term(area1: &str, area2: &str) -> String {
    format!("{}%{}", area1, area2)
}

/// Binding-constraint term key for a thermal cluster (`area.cluster`).
pub fn cluster_term(area_id: &str, cluster_id: &str) -> String {
    format!("{}.{}", area_id, cluster_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets() {
        assert_eq!(link_properties("a", "b"), "input/links/a/properties/b");
        assert_eq!(area_series("load", "fr"), "input/load/series/load_fr");
        assert_eq!(
            ClusterFamily::Thermal.section("fr", "gas"),
            "input/thermal/clusters/fr/list/gas"
        );
        assert_eq!(
            storage_series("fr", "bat", "pmax_injection"),
            "input/st-storage/series/fr/bat/pmax_injection"
        );
    }
}
