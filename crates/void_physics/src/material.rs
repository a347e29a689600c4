//! Materials and the pairwise contact material table

use crate::error::{PhysicsError, Result};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Dense index of a registered material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

/// Dense index of a registered contact material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactMaterialId(pub usize);

struct MaterialInner {
    name: String,
    id: OnceLock<MaterialId>,
}

/// A named surface material.
///
/// Cloning yields another handle to the same material: every clone observes
/// the id assigned when any of them is first registered with a world.
#[derive(Clone)]
pub struct Material(Arc<MaterialInner>);

impl Material {
    /// Create a new, unregistered material
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(MaterialInner {
            name: name.into(),
            id: OnceLock::new(),
        }))
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Registered id, or `None` before `add_material`
    pub fn id(&self) -> Option<MaterialId> {
        self.0.id.get().copied()
    }

    /// Whether both handles refer to the same material
    pub fn same_as(&self, other: &Material) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Material {}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.0.name)
            .field("id", &self.id())
            .finish()
    }
}

/// Friction and restitution used when two materials touch
#[derive(Debug, Clone)]
pub struct ContactMaterial {
    id: Option<ContactMaterialId>,
    /// The two materials, in caller order
    pub materials: [Material; 2],
    /// Friction coefficient
    pub friction: f32,
    /// Restitution/bounciness (0 = no bounce, 1 = perfect bounce)
    pub restitution: f32,
}

impl ContactMaterial {
    /// Create a contact material for a material pair
    pub fn new(m1: &Material, m2: &Material, friction: f32, restitution: f32) -> Self {
        Self {
            id: None,
            materials: [m1.clone(), m2.clone()],
            friction,
            restitution,
        }
    }

    /// Index in the owning world, once registered
    pub fn id(&self) -> Option<ContactMaterialId> {
        self.id
    }

    /// Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.max(0.0);
        self
    }
}

/// Registered materials plus the flattened `(i, j) -> contact material` table.
///
/// Pair keys are stored at `i + len * j` with `i = max(id)` and `j = min(id)`.
#[derive(Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    contact_materials: Vec<ContactMaterial>,
    mats2cmat: Vec<Option<ContactMaterialId>>,
}

impl MaterialTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material. Already registered materials are left untouched.
    pub fn add_material(&mut self, material: &Material) -> MaterialId {
        if let Some(id) = material.id() {
            return id;
        }

        let old_len = self.materials.len();
        let id = *material.0.id.get_or_init(|| MaterialId(old_len));
        self.materials.push(material.clone());

        let len = self.materials.len();
        let mut grown = vec![None; len * len];
        for i in 0..old_len {
            for j in 0..old_len {
                grown[i + len * j] = self.mats2cmat[i + old_len * j];
            }
        }
        self.mats2cmat = grown;

        log::debug!("Registered material '{}' as {:?}", material.name(), id);
        id
    }

    /// Fails if `material` already carries an id from another table
    fn check_owned(&self, material: &Material) -> Result<()> {
        match material.id() {
            Some(id) if !self.materials.get(id.0).is_some_and(|m| m.same_as(material)) => {
                Err(PhysicsError::ForeignMaterial(material.name().to_owned()))
            }
            _ => Ok(()),
        }
    }

    /// Register a contact material and both of its materials.
    ///
    /// Nothing is registered when either material belongs to another table.
    pub fn add_contact_material(&mut self, mut cmat: ContactMaterial) -> Result<ContactMaterialId> {
        for material in &cmat.materials {
            self.check_owned(material)?;
        }
        let id0 = self.add_material(&cmat.materials[0]);
        let id1 = self.add_material(&cmat.materials[1]);

        let len = self.materials.len();
        let (i, j) = (id0.0.max(id1.0), id0.0.min(id1.0));
        let id = ContactMaterialId(self.contact_materials.len());
        cmat.id = Some(id);
        log::debug!(
            "Registered contact material {:?} for '{}'/'{}' (friction {}, restitution {})",
            id,
            cmat.materials[0].name(),
            cmat.materials[1].name(),
            cmat.friction,
            cmat.restitution
        );
        self.contact_materials.push(cmat);
        self.mats2cmat[i + len * j] = Some(id);
        Ok(id)
    }

    /// Contact material for a pair of materials, in either order
    pub fn contact_material(&self, m1: &Material, m2: &Material) -> Option<&ContactMaterial> {
        let (a, b) = (m1.id()?.0, m2.id()?.0);
        if !self.materials.get(a)?.same_as(m1) || !self.materials.get(b)?.same_as(m2) {
            return None;
        }
        let (i, j) = (a.max(b), a.min(b));
        let len = self.materials.len();
        let id = self.mats2cmat[i + j * len]?;
        self.contact_materials.get(id.0)
    }

    /// Registered materials in id order
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Registered contact materials in id order
    pub fn contact_materials(&self) -> &[ContactMaterial] {
        &self.contact_materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_starts_unregistered() {
        let m = Material::new("steel");
        assert_eq!(m.id(), None);
        assert_eq!(m.name(), "steel");
    }

    #[test]
    fn test_clones_share_identity() {
        let mut table = MaterialTable::new();
        let m = Material::new("rubber");
        let copy = m.clone();
        table.add_material(&m);
        assert_eq!(copy.id(), Some(MaterialId(0)));
        assert_eq!(m, copy);
        assert_ne!(m, Material::new("rubber"));
    }

    #[test]
    fn test_add_material_twice_is_noop() {
        let mut table = MaterialTable::new();
        let m = Material::new("ice");
        let first = table.add_material(&m);
        let second = table.add_material(&m);
        assert_eq!(first, second);
        assert_eq!(table.materials().len(), 1);
    }

    #[test]
    fn test_growth_preserves_pairs() {
        let mut table = MaterialTable::new();
        let a = Material::new("a");
        let b = Material::new("b");
        table
            .add_contact_material(ContactMaterial::new(&a, &b, 0.1, 0.5))
            .unwrap();

        // Growing the table must keep (a, b) mapped
        for name in ["c", "d", "e"] {
            table.add_material(&Material::new(name));
        }
        let cm = table.contact_material(&b, &a).unwrap();
        assert_eq!(cm.friction, 0.1);
        assert_eq!(cm.restitution, 0.5);
        assert!(table.contact_material(&a, &a).is_none());
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let mut table = MaterialTable::new();
        let a = Material::new("a");
        let b = Material::new("b");
        let c = Material::new("c");
        table.add_material(&c);
        table
            .add_contact_material(ContactMaterial::new(&b, &a, 0.4, 0.0))
            .unwrap();
        table
            .add_contact_material(ContactMaterial::new(&c, &c, 0.9, 0.1))
            .unwrap();

        let ab = table.contact_material(&a, &b).unwrap();
        let ba = table.contact_material(&b, &a).unwrap();
        assert_eq!(ab.id(), ba.id());
        assert_eq!(ab.id(), Some(ContactMaterialId(0)));
        assert_eq!(table.contact_material(&c, &c).unwrap().friction, 0.9);
        assert!(table.contact_material(&a, &c).is_none());
    }

    #[test]
    fn test_unregistered_lookup_is_none() {
        let table = MaterialTable::new();
        assert!(table
            .contact_material(&Material::new("x"), &Material::new("y"))
            .is_none());
    }

    #[test]
    fn test_foreign_material_rejected() {
        let mut first = MaterialTable::new();
        let mut second = MaterialTable::new();
        let a = Material::new("a");
        let b = Material::new("b");
        first.add_material(&Material::new("pad"));
        first.add_material(&a);
        let result = second.add_contact_material(ContactMaterial::new(&b, &a, 0.3, 0.3));
        assert!(matches!(result, Err(PhysicsError::ForeignMaterial(_))));

        // The rejected call registers neither material
        assert!(second.materials().is_empty());
        assert!(second.contact_materials().is_empty());
        assert_eq!(b.id(), None);
    }
}
