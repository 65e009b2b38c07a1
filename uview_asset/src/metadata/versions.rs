//! Object version thresholds the header parsers gate on

/// UE4 object version
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ObjectVersion(pub i32);

#[allow(missing_docs)]
impl ObjectVersion {
    pub const UNKNOWN: ObjectVersion = ObjectVersion(0);

    pub const VER_UE4_WORLD_LEVEL_INFO: ObjectVersion = ObjectVersion(224);
    pub const VER_UE4_ADDED_CHUNKID_TO_ASSETDATA_AND_UPACKAGE: ObjectVersion = ObjectVersion(278);
    pub const VER_UE4_CHANGED_CHUNKID_TO_BE_AN_ARRAY_OF_CHUNKIDS: ObjectVersion =
        ObjectVersion(326);
    pub const VER_UE4_ENGINE_VERSION_OBJECT: ObjectVersion = ObjectVersion(336);
    pub const VER_UE4_LOAD_FOR_EDITOR_GAME: ObjectVersion = ObjectVersion(365);
    pub const VER_UE4_ADD_STRING_ASSET_REFERENCES_MAP: ObjectVersion = ObjectVersion(384);
    pub const VER_UE4_PACKAGE_SUMMARY_HAS_COMPATIBLE_ENGINE_VERSION: ObjectVersion =
        ObjectVersion(444);
    pub const VER_UE4_SERIALIZE_TEXT_IN_PACKAGES: ObjectVersion = ObjectVersion(459);
    pub const VER_UE4_COOKED_ASSETS_IN_EDITOR_SUPPORT: ObjectVersion = ObjectVersion(485);
    pub const VER_UE4_NAME_HASHES_SERIALIZED: ObjectVersion = ObjectVersion(504);
    pub const VER_UE4_PRELOAD_DEPENDENCIES_IN_COOKED_EXPORTS: ObjectVersion = ObjectVersion(507);
    pub const VER_UE4_TEMPLATE_INDEX_IN_COOKED_EXPORTS: ObjectVersion = ObjectVersion(508);
    pub const VER_UE4_ADDED_SEARCHABLE_NAMES: ObjectVersion = ObjectVersion(510);
    pub const VER_UE4_64BIT_EXPORTMAP_SERIALSIZES: ObjectVersion = ObjectVersion(511);
    pub const VER_UE4_ADDED_PACKAGE_SUMMARY_LOCALIZATION_ID: ObjectVersion = ObjectVersion(516);
    pub const VER_UE4_ADDED_PACKAGE_OWNER: ObjectVersion = ObjectVersion(518);
    pub const VER_UE4_NON_OUTER_PACKAGE_IMPORT: ObjectVersion = ObjectVersion(520);

    /// Version assumed for unversioned cooked assets
    pub const AUTOMATIC: ObjectVersion = ObjectVersion(522);
}

/// UE5 object version
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ObjectVersionUE5(pub i32);

#[allow(missing_docs)]
impl ObjectVersionUE5 {
    pub const UNKNOWN: ObjectVersionUE5 = ObjectVersionUE5(0);

    pub const INITIAL_VERSION: ObjectVersionUE5 = ObjectVersionUE5(1000);
    pub const NAMES_REFERENCED_FROM_EXPORT_DATA: ObjectVersionUE5 = ObjectVersionUE5(1001);
    pub const PAYLOAD_TOC: ObjectVersionUE5 = ObjectVersionUE5(1002);
    pub const OPTIONAL_RESOURCES: ObjectVersionUE5 = ObjectVersionUE5(1003);
    pub const LARGE_WORLD_COORDINATES: ObjectVersionUE5 = ObjectVersionUE5(1004);
    pub const REMOVE_OBJECT_EXPORT_PACKAGE_GUID: ObjectVersionUE5 = ObjectVersionUE5(1005);
    pub const TRACK_OBJECT_EXPORT_IS_INHERITED: ObjectVersionUE5 = ObjectVersionUE5(1006);
    pub const FSOFTOBJECTPATH_REMOVE_ASSET_PATH_FNAMES: ObjectVersionUE5 = ObjectVersionUE5(1007);
    pub const ADD_SOFTOBJECTPATH_LIST: ObjectVersionUE5 = ObjectVersionUE5(1008);
    pub const DATA_RESOURCES: ObjectVersionUE5 = ObjectVersionUE5(1009);

    /// Version assumed for unversioned cooked assets
    pub const AUTOMATIC: ObjectVersionUE5 = ObjectVersionUE5(1009);
}
